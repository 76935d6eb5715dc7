use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-managed list of text lines that prompts can draw from.
///
/// Fragments are addressed by path: `folder/name`, or just `name` when the
/// fragment sits at the top level. Path lookups are case-insensitive and a
/// bare name also matches a fragment inside a folder.
///
/// The lines themselves are stored separately, keyed by `content_id`, so
/// listing fragments never loads their content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub id: Uuid,
    /// Folder path, possibly nested (`characters/hair`). `None` at top level.
    pub folder: Option<String>,
    pub name: String,
    /// Identifier of the stored line content.
    pub content_id: Uuid,
    pub line_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fragment {
    /// The full `folder/name` path of this fragment.
    pub fn path(&self) -> String {
        match &self.folder {
            Some(folder) => format!("{}/{}", folder, self.name),
            None => self.name.clone(),
        }
    }

    /// Whether `path` refers to this fragment, either by full path or by bare name.
    pub fn matches_path(&self, path: &str) -> bool {
        let wanted = path.to_lowercase();
        self.name.to_lowercase() == wanted || self.path().to_lowercase() == wanted
    }
}

/// A fragment together with its lines, used for detail responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentWithLines {
    #[serde(flatten)]
    pub fragment: Fragment,
    pub lines: Vec<String>,
}

/// Input for creating a fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFragmentInput {
    pub folder: Option<String>,
    pub name: String,
    /// Lines of the fragment. Blank and `#` comment lines are dropped.
    #[serde(default)]
    pub lines: Vec<String>,
}

/// Input for creating a fragment from raw text, one line per entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFragmentInput {
    pub folder: Option<String>,
    pub name: String,
    pub text: String,
}

/// Input for updating a fragment. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFragmentInput {
    /// Move the fragment to another folder. An empty string moves it to the top level.
    pub folder: Option<String>,
    pub name: Option<String>,
    /// Replace the fragment's lines.
    pub lines: Option<Vec<String>>,
}

/// Input for duplicating a fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateFragmentInput {
    /// Target folder. Defaults to the source fragment's folder.
    pub folder: Option<String>,
    /// Target name. Defaults to `"<name> copy"`.
    pub name: Option<String>,
}

/// Normalize a fragment path: trim, convert backslashes to forward slashes,
/// and strip leading and trailing slashes.
pub fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/").trim_matches('/').to_string()
}

/// Split a path into its folder and name at the last slash.
pub fn split_path(path: &str) -> (Option<String>, String) {
    let path = normalize_path(path);
    match path.rsplit_once('/') {
        Some((folder, name)) => (normalize_folder(folder), name.trim().to_string()),
        None => (None, path),
    }
}

/// Normalize a folder path. Empty folders mean the top level.
pub fn normalize_folder(folder: &str) -> Option<String> {
    let folder = normalize_path(folder);
    if folder.is_empty() {
        None
    } else {
        Some(folder)
    }
}

/// Trim lines and drop blank lines and `#` comments.
pub fn clean_lines<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                None
            } else {
                Some(line.to_string())
            }
        })
        .collect()
}
