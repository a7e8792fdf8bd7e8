//! File-Context Resolver (spec §4.2): turns `@`-mentions into
//! `(path, content | error)` records, purely as a function of the
//! filesystem snapshot and configuration.

use std::path::Path;
use std::path::PathBuf;

use agentrepl_protocol::FileContext;
use agentrepl_protocol::turn::FileContextError;
use ignore::gitignore::GitignoreBuilder;

#[derive(Debug, Clone, Copy)]
pub struct FileContextResolverConfig {
    pub max_file_size: u64,
}

impl Default for FileContextResolverConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1_000_000,
        }
    }
}

pub struct FileContextResolver {
    config: FileContextResolverConfig,
}

impl FileContextResolver {
    pub fn new(config: FileContextResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve every mention in order, preserving order but flattening
    /// directory mentions into one `FileContext` per eligible file.
    pub fn resolve_all(&self, base_dir: &Path, mentions: &[String]) -> Vec<FileContext> {
        mentions
            .iter()
            .flat_map(|mention| self.resolve_one(base_dir, mention))
            .collect()
    }

    fn resolve_one(&self, base_dir: &Path, mention: &str) -> Vec<FileContext> {
        let resolved = base_dir.join(mention);

        let metadata = match std::fs::symlink_metadata(&resolved) {
            Ok(metadata) => metadata,
            Err(_) => return vec![FileContext::err(mention, FileContextError::NotFound)],
        };

        if metadata.is_dir() {
            return self.resolve_directory(mention, &resolved);
        }

        vec![self.resolve_file(mention, &resolved)]
    }

    fn resolve_file(&self, display_path: &str, absolute: &Path) -> FileContext {
        match self.read_within_limit(absolute) {
            Ok(content) => FileContext::ok(display_path, content),
            Err(err) => FileContext::err(display_path, err),
        }
    }

    fn read_within_limit(&self, absolute: &Path) -> Result<String, FileContextError> {
        let metadata =
            std::fs::metadata(absolute).map_err(|_| FileContextError::NotFound)?;
        if !metadata.is_file() {
            return Err(FileContextError::NotFound);
        }
        if metadata.len() > self.config.max_file_size {
            return Err(FileContextError::ExceedsLimit {
                bytes: metadata.len(),
                limit: self.config.max_file_size,
            });
        }
        let bytes = std::fs::read(absolute).map_err(|_| FileContextError::NotFound)?;
        String::from_utf8(bytes).map_err(|_| FileContextError::NotUtf8)
    }

    /// Enumerate eligible text files in lexicographic (byte-wise) order of
    /// path, non-recursive, applying any `.gitignore` found in the
    /// directory. An empty or fully-excluded directory yields one
    /// informational record.
    fn resolve_directory(&self, display_path: &str, absolute: &Path) -> Vec<FileContext> {
        let mut builder = GitignoreBuilder::new(absolute);
        let _ = builder.add(absolute.join(".gitignore"));
        let gitignore = builder.build().unwrap_or_else(|_| {
            GitignoreBuilder::new(absolute)
                .build()
                .expect("empty gitignore builder never fails")
        });

        let mut entries: Vec<PathBuf> = match std::fs::read_dir(absolute) {
            Ok(read_dir) => read_dir
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_file())
                .filter(|path| !gitignore.matched(path, false).is_ignore())
                .collect(),
            Err(_) => Vec::new(),
        };
        entries.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));

        if entries.is_empty() {
            return vec![FileContext::err(display_path, FileContextError::EmptyDirectory)];
        }

        entries
            .into_iter()
            .map(|entry| {
                let relative = entry
                    .strip_prefix(absolute)
                    .unwrap_or(&entry)
                    .to_string_lossy()
                    .into_owned();
                let full_display = format!("{display_path}/{relative}");
                self.resolve_file(&full_display, &entry)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FileContextResolver {
        FileContextResolver::new(FileContextResolverConfig { max_file_size: 1024 })
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let results = resolver().resolve_all(dir.path(), &["nope.txt".to_string()]);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].outcome,
            Err(FileContextError::NotFound)
        );
    }

    #[test]
    fn oversize_file_reports_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(2048)).expect("write");
        let results = resolver().resolve_all(dir.path(), &["big.txt".to_string()]);
        assert_eq!(
            results[0].outcome,
            Err(FileContextError::ExceedsLimit {
                bytes: 2048,
                limit: 1024
            })
        );
    }

    #[test]
    fn binary_file_reports_not_utf8() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bin.dat");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0xff]).expect("write");
        let results = resolver().resolve_all(dir.path(), &["bin.dat".to_string()]);
        assert_eq!(results[0].outcome, Err(FileContextError::NotUtf8));
    }

    #[test]
    fn readable_file_returns_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ok.txt");
        std::fs::write(&path, "hello").expect("write");
        let results = resolver().resolve_all(dir.path(), &["ok.txt".to_string()]);
        assert_eq!(results[0].outcome, Ok("hello".to_string()));
    }

    #[test]
    fn empty_directory_is_informational() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sub = dir.path().join("empty");
        std::fs::create_dir(&sub).expect("mkdir");
        let results = resolver().resolve_all(dir.path(), &["empty".to_string()]);
        assert_eq!(results[0].outcome, Err(FileContextError::EmptyDirectory));
    }

    #[test]
    fn directory_lists_files_in_lexicographic_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sub = dir.path().join("docs");
        std::fs::create_dir(&sub).expect("mkdir");
        std::fs::write(sub.join("b.txt"), "b").expect("write");
        std::fs::write(sub.join("a.txt"), "a").expect("write");
        let results = resolver().resolve_all(dir.path(), &["docs".to_string()]);
        let paths: Vec<_> = results.iter().map(|fc| fc.path.clone()).collect();
        assert_eq!(paths, vec!["docs/a.txt".to_string(), "docs/b.txt".to_string()]);
    }
}
