//! Thin wrapper around the `inkscape` binary, used to turn PDF printouts into
//! plain SVG drawings before extraction.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use ekgstore::ConversionError;
use regex_lite::Regex;
use tracing::{debug, info, warn};

/// How often a running conversion is checked for completion
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Warm-up timeout is this many times the measured sample conversion
const WARMUP_FACTOR: u32 = 3;

/// Lower bound for a warm-up derived timeout
const MIN_TIMEOUT: Duration = Duration::from_secs(1);

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Inkscape\s+(\d+)\.(\d+)").expect("version pattern is compile-time constant")
});

/// Convert a camelCase option key to the kebab-case form Inkscape expects.
///
/// A run of capitals is one word: `withoutGUI` becomes `without-gui`.
pub fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_upper = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if !prev_upper {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            prev_upper = true;
        } else {
            out.push(c);
            prev_upper = false;
        }
    }
    out
}

/// Command line builder for one Inkscape invocation
#[derive(Debug, Default, Clone)]
pub struct InkscapeArgs {
    args: Vec<String>,
}

impl InkscapeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// `--key=value`
    pub fn option(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.args
            .push(format!("--{}={}", kebab_case(key), value.as_ref()));
        self
    }

    /// `--key`
    pub fn flag(mut self, key: &str) -> Self {
        self.args.push(format!("--{}", kebab_case(key)));
        self
    }

    /// A positional argument, passed through untouched
    pub fn input(mut self, path: impl AsRef<str>) -> Self {
        self.args.push(path.as_ref().to_string());
        self
    }

    pub fn build(self) -> Result<Vec<String>, ConversionError> {
        if self.args.is_empty() {
            return Err(ConversionError::NoArguments);
        }
        Ok(self.args)
    }
}

/// Major/minor version reported by `inkscape --version`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InkscapeVersion {
    pub major: u32,
    pub minor: u32,
}

impl InkscapeVersion {
    pub fn parse(output: &str) -> Result<Self, ConversionError> {
        let unknown = || ConversionError::UnknownVersion {
            output: output.trim().to_string(),
        };
        let caps = VERSION_RE.captures(output.trim_start()).ok_or_else(unknown)?;
        let major = caps[1].parse().map_err(|_| unknown())?;
        let minor = caps[2].parse().map_err(|_| unknown())?;
        Ok(InkscapeVersion { major, minor })
    }

    /// 0.x releases take `--file` and `--without-gui`
    pub fn is_legacy(&self) -> bool {
        self.major == 0
    }
}

impl std::fmt::Display for InkscapeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone)]
pub struct Inkscape {
    binary: String,
}

impl Inkscape {
    pub fn new(binary: impl Into<String>) -> Self {
        Inkscape {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn version(&self) -> Result<InkscapeVersion, ConversionError> {
        let args = InkscapeArgs::new().flag("version").build()?;
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(ConversionError::Failed {
                input: "--version".into(),
                status: output.status.to_string(),
                stderr: stderr_help(&output.stderr),
            });
        }
        InkscapeVersion::parse(&String::from_utf8_lossy(&output.stdout))
    }

    /// Arguments converting `input` into a plain SVG at `output`
    pub fn convert_args(
        version: InkscapeVersion,
        input: &Utf8Path,
        output: &Utf8Path,
    ) -> Result<Vec<String>, ConversionError> {
        if version.is_legacy() {
            InkscapeArgs::new()
                .option("file", input)
                .option("exportPlainSvg", output)
                .flag("withoutGUI")
                .build()
        } else {
            InkscapeArgs::new()
                .flag("exportPlainSvg")
                .option("exportFilename", output)
                .input(input)
                .build()
        }
    }

    /// Run one conversion, killing the child when it outlives `timeout`
    pub fn convert(
        &self,
        version: InkscapeVersion,
        input: &Utf8Path,
        output: &Utf8Path,
        timeout: Duration,
    ) -> Result<(), ConversionError> {
        let args = Self::convert_args(version, input, output)?;
        debug!(binary = %self.binary, ?args, "spawning conversion");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Inkscape is chatty on stderr; drain it so the pipe never fills up.
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let status = wait_with_timeout(&mut child, timeout);
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        match status? {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(ConversionError::Failed {
                input: input.to_string(),
                status: status.to_string(),
                stderr: stderr_help(&stderr),
            }),
            None => Err(ConversionError::TimedOut {
                input: input.to_string(),
                seconds: timeout.as_secs_f64(),
            }),
        }
    }

    fn spawn_error(&self, err: std::io::Error) -> ConversionError {
        if err.kind() == std::io::ErrorKind::NotFound {
            ConversionError::MissingBinary {
                binary: self.binary.clone(),
            }
        } else {
            ConversionError::Io(err)
        }
    }
}

/// `Ok(None)` means the child was killed after `timeout`. The child is never
/// left running when this returns.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(err) => {
                warn!(pid = child.id(), %err, "cannot poll conversion, killing");
                kill_and_reap(child);
                return Err(err);
            }
        }
        if start.elapsed() > timeout {
            warn!(pid = child.id(), ?timeout, "conversion timed out, killing");
            kill_and_reap(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn stderr_help(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Converts PDFs to SVG drawings, caching each result beside its PDF
#[derive(Debug, Clone)]
pub struct Converter {
    inkscape: Inkscape,
    version: InkscapeVersion,
    timeout: Duration,
}

impl Converter {
    /// Probe the binary once; a missing or unrecognizable Inkscape is fatal here
    pub fn new(inkscape: Inkscape, timeout: Duration) -> Result<Self, ConversionError> {
        let version = inkscape.version()?;
        info!(binary = inkscape.binary(), %version, "found inkscape");
        Ok(Converter {
            inkscape,
            version,
            timeout,
        })
    }

    /// Measure one conversion of `sample` and set the timeout to a multiple of it
    pub fn warm_up(&mut self, sample: &Utf8Path) -> Result<Duration, ConversionError> {
        let scratch = Utf8PathBuf::from(format!("{sample}.warmup.svg"));
        let start = Instant::now();
        let converted = self
            .inkscape
            .convert(self.version, sample, &scratch, self.timeout);
        let elapsed = start.elapsed();
        let _ = std::fs::remove_file(&scratch);
        converted?;

        self.timeout = (elapsed * WARMUP_FACTOR).max(MIN_TIMEOUT);
        info!(?elapsed, timeout = ?self.timeout, "warm-up conversion finished");
        Ok(self.timeout)
    }

    /// Where the SVG for `pdf` is cached
    pub fn cache_path(pdf: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{pdf}.svg"))
    }

    /// Conversion target until Inkscape succeeds; keeps the `.svg` extension
    /// Inkscape picks the export type from
    fn partial_path(pdf: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{pdf}.partial.svg"))
    }

    /// SVG drawing for `pdf`, converting only when no cached copy exists.
    ///
    /// A failed or killed run leaves nothing at the cache path.
    pub fn svg_for(&self, pdf: &Utf8Path) -> Result<Utf8PathBuf, ConversionError> {
        let svg = Self::cache_path(pdf);
        if svg.is_file() {
            debug!(%svg, "reusing cached conversion");
            return Ok(svg);
        }

        let partial = Self::partial_path(pdf);
        let converted = self
            .inkscape
            .convert(self.version, pdf, &partial, self.timeout)
            .and_then(|()| std::fs::rename(&partial, &svg).map_err(ConversionError::Io));
        if let Err(err) = converted {
            let _ = std::fs::remove_file(&partial);
            return Err(err);
        }
        Ok(svg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_keys_become_kebab_case() {
        assert_eq!(kebab_case("file"), "file");
        assert_eq!(kebab_case("exportPlainSvg"), "export-plain-svg");
        assert_eq!(kebab_case("withoutGUI"), "without-gui");
        assert_eq!(kebab_case("exportDPI"), "export-dpi");
    }

    #[test]
    fn args_render_options_flags_and_inputs() {
        let args = InkscapeArgs::new()
            .option("exportFilename", "out.svg")
            .flag("exportPlainSvg")
            .input("in.pdf")
            .build()
            .unwrap();
        assert_eq!(
            args,
            ["--export-filename=out.svg", "--export-plain-svg", "in.pdf"]
        );
    }

    #[test]
    fn empty_args_are_rejected() {
        assert!(matches!(
            InkscapeArgs::new().build(),
            Err(ConversionError::NoArguments)
        ));
    }

    #[test]
    fn legacy_and_modern_conversion_args() {
        let input = Utf8Path::new("a.pdf");
        let output = Utf8Path::new("a.pdf.svg");

        let legacy = Inkscape::convert_args(InkscapeVersion { major: 0, minor: 92 }, input, output)
            .unwrap();
        assert_eq!(
            legacy,
            ["--file=a.pdf", "--export-plain-svg=a.pdf.svg", "--without-gui"]
        );

        let modern = Inkscape::convert_args(InkscapeVersion { major: 1, minor: 2 }, input, output)
            .unwrap();
        assert_eq!(
            modern,
            ["--export-plain-svg", "--export-filename=a.pdf.svg", "a.pdf"]
        );
    }

    #[test]
    fn version_output_is_parsed() {
        let v = InkscapeVersion::parse("Inkscape 1.2.2 (b0a8486541, 2022-12-01)\n").unwrap();
        assert_eq!(v, InkscapeVersion { major: 1, minor: 2 });
        assert!(!v.is_legacy());

        let v = InkscapeVersion::parse("Inkscape 0.92.4 (5da689c313, 2019-01-14)").unwrap();
        assert!(v.is_legacy());
        assert_eq!(v.to_string(), "0.92");
    }

    #[test]
    fn foreign_version_output_is_rejected() {
        let err = InkscapeVersion::parse("GIMP 2.10").unwrap_err();
        assert!(matches!(err, ConversionError::UnknownVersion { .. }));
    }

    #[test]
    fn missing_binary_is_reported() {
        let inkscape = Inkscape::new("ekgstore-no-such-inkscape-binary");
        assert!(matches!(
            inkscape.version(),
            Err(ConversionError::MissingBinary { .. })
        ));
    }

    #[test]
    fn cache_sits_beside_the_pdf() {
        assert_eq!(
            Converter::cache_path(Utf8Path::new("scans/a.pdf")),
            Utf8PathBuf::from("scans/a.pdf.svg")
        );
    }

    /// A stand-in `inkscape` that answers `--version` and otherwise writes
    /// `drawing` to its export target, then exits with `code`.
    #[cfg(unix)]
    fn fake_inkscape(dir: &Utf8Path, drawing: &str, code: i32) -> Inkscape {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("inkscape");
        std::fs::write(
            &script,
            format!(
                r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    --version) echo "Inkscape 1.2.2 (test)"; exit 0 ;;
    --export-filename=*) out="${{arg#--export-filename=}}" ;;
  esac
done
printf '%s' '{drawing}' > "$out"
exit {code}
"#
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        Inkscape::new(script.as_str())
    }

    #[cfg(unix)]
    fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(root.join("a.pdf"), "%PDF-1.4").unwrap();
        (dir, root)
    }

    #[cfg(unix)]
    #[test]
    fn failed_conversion_leaves_no_cache() {
        let (_dir, root) = scratch();
        let inkscape = fake_inkscape(&root, r#"<svg><path d="M 0"#, 1);
        let converter = Converter::new(inkscape, Duration::from_secs(10)).unwrap();
        let pdf = root.join("a.pdf");

        for _ in 0..2 {
            assert!(matches!(
                converter.svg_for(&pdf),
                Err(ConversionError::Failed { .. })
            ));
            assert!(!Converter::cache_path(&pdf).exists());
            assert!(!root.join("a.pdf.partial.svg").exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn successful_conversion_is_cached() {
        let (_dir, root) = scratch();
        let inkscape = fake_inkscape(&root, "<svg/>", 0);
        let converter = Converter::new(inkscape, Duration::from_secs(10)).unwrap();
        let pdf = root.join("a.pdf");

        let svg = converter.svg_for(&pdf).unwrap();
        assert_eq!(svg, Converter::cache_path(&pdf));
        assert_eq!(std::fs::read_to_string(&svg).unwrap(), "<svg/>");
        assert!(!root.join("a.pdf.partial.svg").exists());
    }

    #[cfg(unix)]
    #[test]
    fn slow_conversion_is_killed() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, root) = scratch();
        let script = root.join("inkscape");
        std::fs::write(
            &script,
            "#!/bin/sh\n[ \"$1\" = --version ] && { echo 'Inkscape 1.2'; exit 0; }\nexec sleep 30\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let converter =
            Converter::new(Inkscape::new(script.as_str()), Duration::from_millis(300)).unwrap();
        let start = Instant::now();
        let err = converter.svg_for(&root.join("a.pdf")).unwrap_err();
        assert!(matches!(err, ConversionError::TimedOut { .. }), "{err:?}");
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(!Converter::cache_path(&root.join("a.pdf")).exists());
    }
}
