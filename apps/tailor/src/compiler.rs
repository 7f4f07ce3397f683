//! Document compiler turns a `.tex` file into a PDF.
//!
//! The engine runs twice so cross-references settle. Success is judged by the
//! PDF existing afterwards, not by the exit status: pdflatex routinely exits
//! non-zero on recoverable problems while still writing a usable document.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

const PASSES: u32 = 2;
const MAX_ERROR_LINES: usize = 5;
const AUX_EXTENSIONS: [&str; 3] = ["aux", "log", "out"];
const ASSET_EXTENSIONS: [&str; 2] = ["cls", "sty"];

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{program} not found; install TeX Live or MiKTeX")]
    ToolMissing { program: String },

    #[error("compilation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("compilation failed: {details}")]
    Failed { details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compiles a markup file into a binary document inside `out_dir`.
#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    async fn compile(&self, markup: &Path, out_dir: &Path) -> Result<PathBuf, CompileError>;
}

pub struct PdfLatexCompiler {
    program: String,
    timeout: Duration,
    assets_dir: Option<PathBuf>,
}

impl PdfLatexCompiler {
    pub fn new(program: impl Into<String>, timeout: Duration, assets_dir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout,
            assets_dir,
        }
    }

    /// Copies `.cls`/`.sty` support files next to the markup.
    async fn copy_assets(&self, out_dir: &Path) -> Result<(), CompileError> {
        let Some(assets) = &self.assets_dir else {
            return Ok(());
        };
        let mut entries = tokio::fs::read_dir(assets).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_asset = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| ASSET_EXTENSIONS.contains(&e));
            if is_asset {
                tokio::fs::copy(&path, out_dir.join(entry.file_name())).await?;
            }
        }
        Ok(())
    }

    async fn run_pass(&self, markup: &Path, out_dir: &Path, pass: u32) -> Result<(), CompileError> {
        debug!("Running {} (pass {}/{})", self.program, pass, PASSES);
        let child = Command::new(&self.program)
            .arg("-interaction=nonstopmode")
            .arg("-output-directory")
            .arg(out_dir)
            .arg(markup)
            .env("MIKTEX_AUTOINSTALL", "1")
            .env("MIKTEX_ENABLEINSTALLER", "t")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CompileError::ToolMissing {
                    program: self.program.clone(),
                },
                _ => CompileError::Io(e),
            })?;

        let status = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CompileError::Timeout {
                seconds: self.timeout.as_secs(),
            })??
            .status;
        if !status.success() {
            debug!("{} pass {} exited with {}", self.program, pass, status);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentCompiler for PdfLatexCompiler {
    async fn compile(&self, markup: &Path, out_dir: &Path) -> Result<PathBuf, CompileError> {
        let stem = markup
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CompileError::Failed {
                details: format!("invalid markup path {}", markup.display()),
            })?
            .to_string();
        let pdf = out_dir.join(format!("{stem}.pdf"));

        self.copy_assets(out_dir).await?;
        for pass in 1..=PASSES {
            self.run_pass(markup, out_dir, pass).await?;
        }

        if !tokio::fs::try_exists(&pdf).await? {
            let log = out_dir.join(format!("{stem}.log"));
            let log_text = tokio::fs::read(&log)
                .await
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            let errors = error_lines(&log_text);
            let details = if errors.is_empty() {
                "no PDF produced".to_string()
            } else {
                format!("no PDF produced; errors found:\n{}", errors.join("\n"))
            };
            warn!("Compilation of {} failed: {}", markup.display(), details);
            return Err(CompileError::Failed { details });
        }

        cleanup_aux(out_dir, &stem).await;
        info!("Compiled {}", pdf.display());
        Ok(pdf)
    }
}

/// First lines of a TeX log that report errors rather than warnings.
fn error_lines(log: &str) -> Vec<&str> {
    log.lines()
        .filter(|line| line.starts_with('!') && line.contains("Error"))
        .take(MAX_ERROR_LINES)
        .collect()
}

async fn cleanup_aux(out_dir: &Path, stem: &str) {
    for ext in AUX_EXTENSIONS {
        let path = out_dir.join(format!("{stem}.{ext}"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_lines_skip_warnings_and_cap_at_five() {
        let mut log = String::from("LaTeX Warning: Reference undefined.\n! Undefined control sequence.\n");
        for i in 0..7 {
            log.push_str(&format!("! LaTeX Error: problem {i}\n"));
        }
        let lines = error_lines(&log);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "! LaTeX Error: problem 0");
    }

    #[tokio::test]
    async fn test_missing_tool_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("Resume.tex");
        std::fs::write(&tex, "x").unwrap();
        let compiler = PdfLatexCompiler::new("definitely-not-a-tex-engine", Duration::from_secs(5), None);
        let err = compiler.compile(&tex, dir.path()).await.unwrap_err();
        assert!(matches!(err, CompileError::ToolMissing { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    mod engine_scripts {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-tex.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn setup() -> (tempfile::TempDir, tempfile::TempDir, PathBuf) {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let tex = out.path().join("Resume.tex");
            std::fs::write(&tex, "\\documentclass{article}").unwrap();
            (bin, out, tex)
        }

        #[tokio::test]
        async fn test_nonzero_exit_with_pdf_is_success_and_cleans_aux() {
            let (bin, out, tex) = setup();
            let program = script(
                bin.path(),
                r#"name=$(basename "$4" .tex)
echo "%PDF-1.4" > "$3/$name.pdf"
echo "log" > "$3/$name.log"
touch "$3/$name.aux" "$3/$name.out"
echo "$4" >> "$3/passes.txt"
exit 1"#,
            );
            let compiler = PdfLatexCompiler::new(program, Duration::from_secs(10), None);
            let pdf = compiler.compile(&tex, out.path()).await.unwrap();

            assert_eq!(pdf, out.path().join("Resume.pdf"));
            assert!(pdf.exists());
            for ext in AUX_EXTENSIONS {
                assert!(!out.path().join(format!("Resume.{ext}")).exists(), "{ext} left behind");
            }
            let passes = std::fs::read_to_string(out.path().join("passes.txt")).unwrap();
            assert_eq!(passes.lines().count(), 2, "engine must run twice");
        }

        #[tokio::test]
        async fn test_no_pdf_surfaces_log_errors() {
            let (bin, out, tex) = setup();
            let program = script(
                bin.path(),
                r#"name=$(basename "$4" .tex)
printf '! LaTeX Error: File `fancy.sty'"'"' not found.\nLaTeX Warning: ignored\n' > "$3/$name.log"
exit 1"#,
            );
            let compiler = PdfLatexCompiler::new(program, Duration::from_secs(10), None);
            match compiler.compile(&tex, out.path()).await.unwrap_err() {
                CompileError::Failed { details } => {
                    assert!(details.contains("fancy.sty"), "got: {details}");
                    assert!(!details.contains("Warning"));
                }
                other => panic!("expected Failed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_hung_engine_times_out() {
            let (bin, out, tex) = setup();
            let program = script(bin.path(), "sleep 10");
            let compiler = PdfLatexCompiler::new(program, Duration::from_secs(1), None);
            let err = compiler.compile(&tex, out.path()).await.unwrap_err();
            assert!(matches!(err, CompileError::Timeout { seconds: 1 }), "got {err:?}");
        }

        #[tokio::test]
        async fn test_assets_copied_before_compile() {
            let (bin, out, tex) = setup();
            let assets = tempfile::tempdir().unwrap();
            std::fs::write(assets.path().join("resume.cls"), "% class").unwrap();
            std::fs::write(assets.path().join("notes.txt"), "skip me").unwrap();
            let program = script(
                bin.path(),
                r#"test -f "$3/resume.cls" || exit 2
name=$(basename "$4" .tex)
echo "%PDF-1.4" > "$3/$name.pdf""#,
            );
            let compiler = PdfLatexCompiler::new(
                program,
                Duration::from_secs(10),
                Some(assets.path().to_path_buf()),
            );
            compiler.compile(&tex, out.path()).await.unwrap();
            assert!(out.path().join("resume.cls").exists());
            assert!(!out.path().join("notes.txt").exists());
        }
    }
}
