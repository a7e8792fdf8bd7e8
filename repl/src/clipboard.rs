//! Clipboard collaborator (spec §6). The concrete subprocess mechanics are
//! named out of scope, but an in-tree default keeps the crate runnable
//! without an embedder, the same way `shell_crossterm` does for [`Shell`].

use std::process::Stdio;

use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;

use crate::error::ClipboardErrorKind;
use crate::error::ReplError;

pub trait Clipboard {
    /// Spawns the copy; runs on a worker so the cooperative loop is never
    /// blocked (spec §5).
    fn copy<'a>(
        &'a self,
        text: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ReplError>> + 'a>>;
}

/// Shells out to the first platform utility found on `PATH`: `pbcopy`
/// (macOS), `wl-copy` or `xclip`/`xsel` (Linux/X11 or Wayland), `clip.exe`
/// (Windows/WSL).
pub struct SubprocessClipboard;

impl SubprocessClipboard {
    fn candidates() -> &'static [(&'static str, &'static [&'static str])] {
        &[
            ("pbcopy", &[]),
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
            ("clip.exe", &[]),
        ]
    }

    fn locate() -> Option<(&'static str, &'static [&'static str])> {
        Self::candidates()
            .iter()
            .copied()
            .find(|(bin, _)| which::which(bin).is_ok())
    }
}

impl Clipboard for SubprocessClipboard {
    fn copy<'a>(
        &'a self,
        text: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ReplError>> + 'a>> {
        Box::pin(async move {
            let Some((bin, args)) = Self::locate() else {
                return Err(ReplError::Clipboard {
                    kind: ClipboardErrorKind::MissingUtility,
                    detail: "no clipboard utility found on PATH".to_string(),
                });
            };

            let mut child = Command::new(bin)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|err| ReplError::Clipboard {
                    kind: ClipboardErrorKind::SubprocessFailure,
                    detail: err.to_string(),
                })?;

            let mut stdin = child.stdin.take().ok_or_else(|| ReplError::Clipboard {
                kind: ClipboardErrorKind::SubprocessFailure,
                detail: "clipboard utility closed stdin immediately".to_string(),
            })?;
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|err| ReplError::Clipboard {
                    kind: ClipboardErrorKind::SubprocessFailure,
                    detail: err.to_string(),
                })?;
            drop(stdin);

            let output = child.wait_with_output().await.map_err(|err| ReplError::Clipboard {
                kind: ClipboardErrorKind::SubprocessFailure,
                detail: err.to_string(),
            })?;
            if !output.status.success() {
                return Err(ReplError::Clipboard {
                    kind: ClipboardErrorKind::SubprocessFailure,
                    detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            Ok(())
        })
    }
}

/// No-op clipboard used in platforms/tests where no utility is expected to
/// be present; always reports `unsupported-platform`.
pub struct UnsupportedClipboard;

impl Clipboard for UnsupportedClipboard {
    fn copy<'a>(
        &'a self,
        _text: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ReplError>> + 'a>> {
        Box::pin(async {
            Err(ReplError::Clipboard {
                kind: ClipboardErrorKind::UnsupportedPlatform,
                detail: "clipboard support is not available on this platform".to_string(),
            })
        })
    }
}
