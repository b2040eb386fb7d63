use crate::connection::Connection;
use crate::error::CoreError;
use crate::protocol::{
    decode_download, decode_file_content, decode_file_list, path_params, rename_params,
    write_params, CommandKind, FileEntry,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use craftconsole_config::ListParamsStyle;
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "log", "yml", "yaml", "json", "xml", "html", "htm", "css", "js", "ts", "sh", "bat",
    "cmd", "py", "java", "c", "cpp", "h", "hpp", "cs", "go", "rb", "php", "pl", "sql", "ini",
    "cfg", "conf", "properties", "md", "csv",
];

pub fn is_text_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn compare_entries(a: &FileEntry, b: &FileEntry) -> Ordering {
    b.is_folder
        .cmp(&a.is_folder)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(compare_entries);
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditBuffer {
    pub path: String,
    pub entry: Option<FileEntry>,
    pub content: String,
    pub original: String,
    pub dirty: bool,
    pub loaded: bool,
    pub saving: bool,
}

impl EditBuffer {
    fn pending(path: String, entry: Option<FileEntry>) -> Self {
        Self {
            path,
            entry,
            content: String::new(),
            original: String::new(),
            dirty: false,
            loaded: false,
            saving: false,
        }
    }

    fn fill(&mut self, content: String) {
        self.original = content.clone();
        self.content = content;
        self.dirty = false;
        self.loaded = true;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadBatch {
    pub total: usize,
    pub completed: usize,
}

impl UploadBatch {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

pub trait DownloadSink {
    fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "download".into());
        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(name);
        fs::write(&target, bytes)?;
        Ok(target)
    }
}

#[derive(Debug)]
pub struct RemoteFileSystemNavigator {
    list_params: ListParamsStyle,
    root: Option<String>,
    current_path: String,
    segments: Vec<String>,
    files: Vec<FileEntry>,
    loading: bool,
    edit: Option<EditBuffer>,
    upload: Option<UploadBatch>,
}

impl RemoteFileSystemNavigator {
    pub fn new(list_params: ListParamsStyle) -> Self {
        Self {
            list_params,
            root: None,
            current_path: String::new(),
            segments: Vec::new(),
            files: Vec::new(),
            loading: false,
            edit: None,
            upload: None,
        }
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn find(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn edit_buffer(&self) -> Option<&EditBuffer> {
        self.edit.as_ref()
    }

    pub fn upload_batch(&self) -> Option<UploadBatch> {
        self.upload
    }

    fn at_root(&self) -> bool {
        self.root.as_deref() == Some(self.current_path.as_str())
    }

    // Path of `name` inside the current directory. At the root the name is
    // appended as is; the server reports its root with a trailing separator.
    pub fn child_path(&self, name: &str) -> String {
        if self.at_root() {
            format!("{}{}", self.current_path, name)
        } else {
            format!("{}/{}", self.current_path, name)
        }
    }

    fn send(
        &mut self,
        conn: &Connection,
        kind: CommandKind,
        params: String,
    ) -> Result<(), CoreError> {
        self.loading = true;
        if let Err(err) = conn.send(kind, Some(params)) {
            self.loading = false;
            return Err(err);
        }
        Ok(())
    }

    pub fn list(&mut self, conn: &Connection, path: &str) -> Result<(), CoreError> {
        let params = match self.list_params {
            ListParamsStyle::Json => path_params(path),
            ListParamsStyle::Plain => path.to_string(),
        };
        debug!(server = %conn.server(), path = %path, "listing directory");
        self.send(conn, CommandKind::FileList, params)
    }

    pub fn refresh(&mut self, conn: &Connection) -> Result<(), CoreError> {
        let path = self.current_path.clone();
        self.list(conn, &path)
    }

    pub fn navigate_to_root(&mut self, conn: &Connection) -> Result<(), CoreError> {
        let root = self.root.clone().unwrap_or_default();
        self.list(conn, &root)
    }

    pub fn navigate_to_segment(&mut self, conn: &Connection, index: usize) -> Result<(), CoreError> {
        if index >= self.segments.len() {
            return Err(CoreError::Invalid(format!("no path segment {index}")));
        }
        let root = self.root.clone().unwrap_or_default();
        let path = format!("{}/{}", root, self.segments[..=index].join("/"));
        self.list(conn, &path)
    }

    pub fn navigate_to_folder(&mut self, conn: &Connection, entry: &FileEntry) -> Result<(), CoreError> {
        if !entry.is_folder {
            return Err(CoreError::Invalid(format!("{} is not a folder", entry.name)));
        }
        let path = self.child_path(&entry.name);
        self.list(conn, &path)
    }

    pub fn go_up(&mut self, conn: &Connection) -> Result<bool, CoreError> {
        let root = match &self.root {
            Some(root) if *root != self.current_path => root.clone(),
            _ => return Ok(false),
        };
        let parent = match self.current_path.rfind('/') {
            Some(idx) if idx > root.len() => self.current_path[..idx].to_string(),
            _ => root,
        };
        self.list(conn, &parent)?;
        Ok(true)
    }

    pub fn update_path_parts(&mut self, path: &str) {
        self.current_path = path.to_string();
        if self.root.as_deref().map_or(true, str::is_empty) {
            self.root = Some(path.to_string());
        }
        let root = self.root.as_deref().unwrap_or_default();
        if path.is_empty() || path == root {
            self.segments.clear();
            return;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = relative.strip_prefix('/').unwrap_or(relative);
        self.segments = relative.split('/').map(str::to_string).collect();
    }

    // Applies a listing reply. The reply's own `current_path` becomes the
    // current directory, whatever was last requested.
    pub fn apply_listing(&mut self, files: &str, current_path: &str) {
        self.loading = false;
        match decode_file_list(files) {
            Ok(mut entries) => {
                sort_entries(&mut entries);
                self.files = entries;
                self.update_path_parts(current_path);
            }
            Err(err) => {
                warn!(error = %err, "discarding malformed file list");
                self.files.clear();
            }
        }
    }

    pub fn read(&mut self, conn: &Connection, path: &str) -> Result<(), CoreError> {
        self.send(conn, CommandKind::FileRead, path_params(path))
    }

    pub fn open_file(&mut self, conn: &Connection, entry: &FileEntry) -> Result<(), CoreError> {
        if entry.is_folder {
            return Err(CoreError::Invalid(format!("{} is a folder", entry.name)));
        }
        let path = self.child_path(&entry.name);
        self.read(conn, &path)?;
        self.edit = Some(EditBuffer::pending(path, Some(entry.clone())));
        Ok(())
    }

    pub fn apply_file_content(&mut self, content: &str) {
        self.loading = false;
        let decoded = match decode_file_content(content) {
            Ok(file) => file,
            Err(err) => {
                warn!(error = %err, "discarding malformed file content");
                if self.edit.as_ref().is_some_and(|b| !b.loaded) {
                    self.edit = None;
                }
                return;
            }
        };

        let text = if decoded.is_binary {
            match STANDARD.decode(decoded.content.as_bytes()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    warn!(path = %decoded.path, error = %err, "binary file content is not base64");
                    String::new()
                }
            }
        } else {
            decoded.content
        };

        match self.edit.as_mut() {
            Some(buffer) if buffer.dirty || buffer.saving => {
                warn!(open = %buffer.path, reply = %decoded.path, "keeping edited buffer, dropping file content");
            }
            Some(buffer) if buffer.path == decoded.path => buffer.fill(text),
            Some(buffer) if !buffer.loaded => {
                debug!(pending = %buffer.path, reply = %decoded.path, "dropping stale file content");
            }
            _ => {
                let mut buffer = EditBuffer::pending(decoded.path, None);
                buffer.fill(text);
                self.edit = Some(buffer);
            }
        }
    }

    pub fn edit(&mut self, content: impl Into<String>) -> Result<(), CoreError> {
        let buffer = self
            .edit
            .as_mut()
            .ok_or_else(|| CoreError::Invalid("no file is open".to_string()))?;
        buffer.content = content.into();
        buffer.dirty = buffer.content != buffer.original;
        Ok(())
    }

    pub fn save(&mut self, conn: &Connection) -> Result<(), CoreError> {
        let (path, content) = match &self.edit {
            Some(buffer) if buffer.loaded => (buffer.path.clone(), buffer.content.clone()),
            Some(buffer) => {
                return Err(CoreError::Invalid(format!("{} has not loaded yet", buffer.path)))
            }
            None => return Err(CoreError::Invalid("no file is open".to_string())),
        };
        self.write(conn, &path, &content)?;
        if let Some(buffer) = self.edit.as_mut() {
            buffer.saving = true;
            buffer.dirty = false;
        }
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    pub fn write(&mut self, conn: &Connection, path: &str, content: &str) -> Result<(), CoreError> {
        self.send(conn, CommandKind::FileWrite, write_params(path, content))
    }

    pub fn create_file(&mut self, conn: &Connection, name: &str) -> Result<(), CoreError> {
        let path = self.child_path(name);
        self.write(conn, &path, "")
    }

    pub fn delete(&mut self, conn: &Connection, path: &str) -> Result<(), CoreError> {
        self.send(conn, CommandKind::FileDelete, path_params(path))
    }

    pub fn delete_entry(&mut self, conn: &Connection, entry: &FileEntry) -> Result<(), CoreError> {
        let path = self.child_path(&entry.name);
        self.delete(conn, &path)
    }

    pub fn rename(&mut self, conn: &Connection, old_path: &str, new_path: &str) -> Result<(), CoreError> {
        self.send(conn, CommandKind::FileRename, rename_params(old_path, new_path))
    }

    pub fn rename_entry(
        &mut self,
        conn: &Connection,
        entry: &FileEntry,
        new_name: &str,
    ) -> Result<(), CoreError> {
        if new_name.is_empty() {
            return Err(CoreError::Invalid("new name is empty".to_string()));
        }
        let old_path = self.child_path(&entry.name);
        let new_path = self.child_path(new_name);
        self.rename(conn, &old_path, &new_path)
    }

    pub fn create_folder(&mut self, conn: &Connection, path: &str) -> Result<(), CoreError> {
        self.send(conn, CommandKind::FileCreateFolder, path_params(path))
    }

    pub fn create_folder_named(&mut self, conn: &Connection, name: &str) -> Result<(), CoreError> {
        if name.is_empty() {
            return Err(CoreError::Invalid("folder name is empty".to_string()));
        }
        let path = self.child_path(name);
        self.create_folder(conn, &path)
    }

    pub fn download(&mut self, conn: &Connection, path: &str) -> Result<(), CoreError> {
        self.send(conn, CommandKind::FileDownload, path_params(path))
    }

    pub fn download_entry(&mut self, conn: &Connection, entry: &FileEntry) -> Result<(), CoreError> {
        let path = self.child_path(&entry.name);
        self.download(conn, &path)
    }

    pub fn apply_operation_success(
        &mut self,
        conn: &Connection,
        path: Option<&str>,
    ) -> Result<(), CoreError> {
        self.loading = false;
        let saved = match (&self.edit, path) {
            (Some(buffer), Some(path)) => buffer.saving && buffer.path == path,
            _ => false,
        };
        if saved {
            info!(path = ?path, "file saved");
            self.edit = None;
        }
        self.refresh(conn)
    }

    pub fn apply_download(&mut self, content: &str, sink: &dyn DownloadSink) -> Option<PathBuf> {
        self.loading = false;
        let download = match decode_download(content) {
            Ok(download) => download,
            Err(err) => {
                warn!(error = %err, "discarding malformed download");
                return None;
            }
        };
        let bytes = match STANDARD.decode(download.content.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(filename = %download.filename, error = %err, "download is not base64");
                return None;
            }
        };
        match sink.save(&download.filename, &bytes) {
            Ok(path) => {
                info!(filename = %download.filename, path = %path.display(), "download saved");
                Some(path)
            }
            Err(err) => {
                warn!(filename = %download.filename, error = %err, "failed to save download");
                None
            }
        }
    }

    pub fn apply_error(&mut self) {
        self.loading = false;
        if let Some(buffer) = self.edit.as_mut().filter(|b| b.saving) {
            buffer.saving = false;
            buffer.dirty = buffer.content != buffer.original;
        }
    }

    pub fn start_upload(&mut self, total: usize) {
        if total == 0 {
            return;
        }
        self.loading = true;
        self.upload = Some(UploadBatch {
            total,
            completed: 0,
        });
    }

    pub fn upload_encoded(
        &mut self,
        conn: &Connection,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), CoreError> {
        let path = self.child_path(name);
        let content = match std::str::from_utf8(bytes) {
            Ok(text) if is_text_file(name) => text.to_string(),
            _ => STANDARD.encode(bytes),
        };
        if let Err(err) = conn.send(CommandKind::FileWrite, Some(write_params(&path, &content))) {
            self.upload = None;
            self.loading = false;
            return Err(err);
        }

        let finished = match self.upload.as_mut() {
            Some(batch) => {
                batch.completed += 1;
                batch.is_complete()
            }
            None => true,
        };
        if finished {
            self.upload = None;
            self.loading = false;
            self.refresh(conn)?;
        }
        Ok(())
    }

    pub fn upload(&mut self, conn: &Connection, files: &[(String, Vec<u8>)]) -> Result<(), CoreError> {
        self.start_upload(files.len());
        for (name, bytes) in files {
            self.upload_encoded(conn, name, bytes)?;
        }
        Ok(())
    }
}
