mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use chrono::Utc;
use rand::seq::SliceRandom;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::*;

const FRAGMENT_COLUMNS: &str =
    "id, folder, name, content_id, line_count, created_at, updated_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "wildprompt")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("wildprompt.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Fragment operations
    // ============================================================

    /// All fragments, ordered by folder then name. Top-level fragments come first.
    pub fn list_fragments(&self) -> Result<Vec<Fragment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM fragments
             ORDER BY folder COLLATE NOCASE, name COLLATE NOCASE"
        ))?;

        let fragments = stmt
            .query_map([], fragment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(fragments)
    }

    pub fn list_fragments_in_folder(&self, folder: &str) -> Result<Vec<Fragment>> {
        let folder = normalize_folder(folder).unwrap_or_default();
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM fragments
             WHERE folder = ? COLLATE NOCASE ORDER BY name COLLATE NOCASE"
        ))?;

        let fragments = stmt
            .query_map([folder], fragment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(fragments)
    }

    pub fn get_fragment(&self, id: Uuid) -> Result<Option<Fragment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let fragment = conn
            .query_row(
                &format!("SELECT {FRAGMENT_COLUMNS} FROM fragments WHERE id = ?"),
                [id.to_string()],
                fragment_from_row,
            )
            .optional()?;
        Ok(fragment)
    }

    pub fn get_fragment_lines(&self, id: Uuid) -> Result<Option<Vec<String>>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let lines_json: Option<String> = conn
            .query_row(
                "SELECT c.lines FROM fragments f
                 JOIN fragment_contents c ON c.id = f.content_id
                 WHERE f.id = ?",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match lines_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn get_fragment_with_lines(&self, id: Uuid) -> Result<Option<FragmentWithLines>> {
        let Some(fragment) = self.get_fragment(id)? else {
            return Ok(None);
        };
        let lines = self.get_fragment_lines(id)?.unwrap_or_default();
        Ok(Some(FragmentWithLines { fragment, lines }))
    }

    /// Find a fragment by `folder/name` or bare `name`, case-insensitively.
    ///
    /// When several fragments share a bare name, the first in
    /// [`list_fragments`](Self::list_fragments) order wins.
    pub fn find_fragment(&self, path: &str) -> Result<Option<Fragment>> {
        let path = normalize_path(path);
        if path.is_empty() {
            return Ok(None);
        }

        Ok(self
            .list_fragments()?
            .into_iter()
            .find(|fragment| fragment.matches_path(&path)))
    }

    pub fn create_fragment(&self, input: CreateFragmentInput) -> Result<Fragment> {
        let folder = input.folder.as_deref().and_then(normalize_folder);
        let name = validate_name(&input.name)?;
        let lines = clean_lines(&input.lines);

        let conn = self.conn.lock().expect("database lock poisoned");
        if path_taken(&conn, folder.as_deref(), &name, None)? {
            bail!("Fragment {} already exists", display_path(folder.as_deref(), &name));
        }

        let id = Uuid::new_v4();
        let content_id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO fragment_contents (id, lines) VALUES (?, ?)",
            (content_id.to_string(), serde_json::to_string(&lines)?),
        )?;
        conn.execute(
            "INSERT INTO fragments (id, folder, name, content_id, line_count, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                folder.clone().unwrap_or_default(),
                &name,
                content_id.to_string(),
                lines.len() as i64,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        tracing::debug!(
            "Created fragment {} with {} lines",
            display_path(folder.as_deref(), &name),
            lines.len()
        );

        Ok(Fragment {
            id,
            folder,
            name,
            content_id,
            line_count: lines.len(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Create a fragment from raw text, one line per entry.
    pub fn import_fragment(&self, input: ImportFragmentInput) -> Result<Fragment> {
        self.create_fragment(CreateFragmentInput {
            folder: input.folder,
            name: input.name,
            lines: clean_lines(input.text.lines()),
        })
    }

    pub fn update_fragment(&self, id: Uuid, input: UpdateFragmentInput) -> Result<Option<Fragment>> {
        let Some(existing) = self.get_fragment(id)? else {
            return Ok(None);
        };

        let folder = match input.folder {
            Some(folder) => normalize_folder(&folder),
            None => existing.folder,
        };
        let name = match input.name {
            Some(name) => validate_name(&name)?,
            None => existing.name,
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        if path_taken(&conn, folder.as_deref(), &name, Some(id))? {
            bail!("Fragment {} already exists", display_path(folder.as_deref(), &name));
        }

        let now = Utc::now();
        let mut line_count = existing.line_count;

        if let Some(lines) = input.lines {
            let lines = clean_lines(&lines);
            line_count = lines.len();
            conn.execute(
                "UPDATE fragment_contents SET lines = ? WHERE id = ?",
                (
                    serde_json::to_string(&lines)?,
                    existing.content_id.to_string(),
                ),
            )?;
        }

        conn.execute(
            "UPDATE fragments SET folder = ?, name = ?, line_count = ?, updated_at = ? WHERE id = ?",
            (
                folder.clone().unwrap_or_default(),
                &name,
                line_count as i64,
                now.to_rfc3339(),
                id.to_string(),
            ),
        )?;

        Ok(Some(Fragment {
            id,
            folder,
            name,
            content_id: existing.content_id,
            line_count,
            created_at: existing.created_at,
            updated_at: now,
        }))
    }

    pub fn delete_fragment(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let content_id: Option<String> = conn
            .query_row(
                "SELECT content_id FROM fragments WHERE id = ?",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(content_id) = content_id else {
            return Ok(false);
        };

        conn.execute("DELETE FROM fragments WHERE id = ?", [id.to_string()])?;
        conn.execute("DELETE FROM fragment_contents WHERE id = ?", [content_id])?;
        Ok(true)
    }

    /// Copy a fragment and its lines under a new id.
    ///
    /// Without an explicit name the copy is called `"<name> copy"`, numbered
    /// (`"<name> copy 2"`, ...) when that path is already taken.
    pub fn duplicate_fragment(
        &self,
        id: Uuid,
        input: DuplicateFragmentInput,
    ) -> Result<Option<Fragment>> {
        let Some(source) = self.get_fragment_with_lines(id)? else {
            return Ok(None);
        };

        let folder = match input.folder {
            Some(folder) => normalize_folder(&folder),
            None => source.fragment.folder.clone(),
        };

        let name = match input.name {
            Some(name) => name,
            None => {
                let conn = self.conn.lock().expect("database lock poisoned");
                let base = format!("{} copy", source.fragment.name);
                let mut candidate = base.clone();
                let mut n = 2;
                while path_taken(&conn, folder.as_deref(), &candidate, None)? {
                    candidate = format!("{} {}", base, n);
                    n += 1;
                }
                candidate
            }
        };

        self.create_fragment(CreateFragmentInput {
            folder,
            name,
            lines: source.lines,
        })
        .map(Some)
    }

    // ============================================================
    // Line access
    // ============================================================

    /// A uniformly random line of the fragment at `path`, or `None` if the
    /// path is unknown or the fragment has no lines.
    pub fn random_line(&self, path: &str) -> Result<Option<String>> {
        let Some(lines) = self.lines_for_path(path)? else {
            return Ok(None);
        };
        Ok(lines.choose(&mut rand::thread_rng()).cloned())
    }

    /// The line under the sequential cursor for `path`, advancing the cursor.
    ///
    /// The cursor is keyed by `path` exactly as given. It is not touched when
    /// the path is unknown or the fragment has no lines.
    pub fn next_sequential_line(&self, path: &str) -> Result<Option<String>> {
        let Some(mut lines) = self.lines_for_path(path)? else {
            return Ok(None);
        };
        if lines.is_empty() {
            return Ok(None);
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let position: i64 = conn
            .query_row(
                "SELECT position FROM sequential_counters WHERE path = ?",
                [path],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        let index = position.rem_euclid(lines.len() as i64) as usize;

        conn.execute(
            "INSERT INTO sequential_counters (path, position, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET position = excluded.position, updated_at = excluded.updated_at",
            (path, position + 1, Utc::now().to_rfc3339()),
        )?;

        Ok(Some(lines.swap_remove(index)))
    }

    /// Reset the sequential cursor for `path`, or every cursor when `None`.
    /// Returns the number of cursors removed.
    pub fn reset_sequential_counter(&self, path: Option<&str>) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = match path {
            Some(path) => conn.execute("DELETE FROM sequential_counters WHERE path = ?", [path])?,
            None => conn.execute("DELETE FROM sequential_counters", [])?,
        };
        Ok(rows)
    }

    pub fn list_sequential_counters(&self) -> Result<Vec<SequentialCounter>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT path, position, updated_at FROM sequential_counters ORDER BY path",
        )?;

        let counters = stmt
            .query_map([], |row| {
                Ok(SequentialCounter {
                    path: row.get(0)?,
                    position: row.get(1)?,
                    updated_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counters)
    }

    fn lines_for_path(&self, path: &str) -> Result<Option<Vec<String>>> {
        match self.find_fragment(path)? {
            Some(fragment) => self.get_fragment_lines(fragment.id),
            None => Ok(None),
        }
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn fragment_from_row(row: &Row<'_>) -> rusqlite::Result<Fragment> {
    let folder: String = row.get(1)?;
    Ok(Fragment {
        id: parse_uuid(row.get::<_, String>(0)?),
        folder: if folder.is_empty() { None } else { Some(folder) },
        name: row.get(2)?,
        content_id: parse_uuid(row.get::<_, String>(3)?),
        line_count: row.get::<_, i64>(4)?.max(0) as usize,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Fragment name cannot be empty");
    }
    if name.contains('/') || name.contains('\\') {
        bail!("Fragment name cannot contain a slash");
    }
    Ok(name.to_string())
}

fn path_taken(
    conn: &Connection,
    folder: Option<&str>,
    name: &str,
    except: Option<Uuid>,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM fragments
         WHERE folder = ?1 COLLATE NOCASE AND name = ?2 COLLATE NOCASE AND id != ?3",
        (
            folder.unwrap_or_default(),
            name,
            except.map(|id| id.to_string()).unwrap_or_default(),
        ),
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn display_path(folder: Option<&str>, name: &str) -> String {
    match folder {
        Some(folder) => format!("{}/{}", folder, name),
        None => name.to_string(),
    }
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
