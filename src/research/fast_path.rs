//! Fast-Path Gate (Component G).
//!
//! Static registry of argv-only external tool invocations matched by URL
//! regex. `validate_and_build` enforces every safety check before handing
//! back an executable command; there is no escape hatch to shell strings.

use crate::research::config::AutonomyMode;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const SHELL_DANGEROUS_CHARS: &[char] =
    &[';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '!', '#', '<', '>', '\\', '\'', '"'];

const FORBIDDEN_PRIVILEGE_COMMANDS: &[&str] = &["sudo", "su", "pkexec", "doas"];

/// A registered fast-path tool.
pub struct FastPathEntry {
    /// Unique id, e.g. `"yt-dlp"`.
    pub id: &'static str,
    /// Host patterns this entry can handle.
    pub host_patterns: Vec<Regex>,
    /// Argv template; each token may reference `{url}` and `{outputDir}`.
    pub argv_template: Vec<&'static str>,
    /// Shell command used to probe tool availability (e.g. `"yt-dlp"`).
    pub check_command: &'static str,
    /// Default timeout for this tool, in milliseconds.
    pub timeout_ms: u64,
}

impl FastPathEntry {
    fn validate_template(&self) -> Result<(), String> {
        for token in &self.argv_template {
            let mut rest = *token;
            while let Some(start) = rest.find('{') {
                let Some(end) = rest[start..].find('}') else {
                    return Err(format!("unterminated placeholder in template token: {token}"));
                };
                let placeholder = &rest[start + 1..start + end];
                if placeholder != "url" && placeholder != "outputDir" {
                    return Err(format!("unknown placeholder {{{placeholder}}} in fast-path template"));
                }
                rest = &rest[start + end + 1..];
            }
        }
        Ok(())
    }
}

/// A validated, ready-to-execute command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastPathCommand {
    /// Fully expanded argv, `argv[0]` is the binary.
    pub argv: Vec<String>,
    /// Timeout to apply when running this command.
    pub timeout_ms: u64,
}

/// Checks whether a tool reports as available by probing `which`.
pub trait ToolAvailability: Send + Sync {
    /// Returns true if `check_command` resolves to an installed binary.
    fn is_available(&self, check_command: &str) -> bool;
}

/// Caches tool availability at construction time via `which`.
pub struct WhichAvailability {
    cache: HashMap<String, bool>,
}

impl WhichAvailability {
    /// Probes every `check_command` among `entries` once, at construction.
    #[must_use]
    pub fn probe(entries: &[FastPathEntry]) -> Self {
        let mut cache = HashMap::new();
        for entry in entries {
            let available = std::process::Command::new("which")
                .arg(entry.check_command)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            cache.insert(entry.check_command.to_string(), available);
        }
        Self { cache }
    }
}

impl ToolAvailability for WhichAvailability {
    fn is_available(&self, check_command: &str) -> bool {
        self.cache.get(check_command).copied().unwrap_or(false)
    }
}

/// Static registry of fast-path entries plus a tool-availability cache.
pub struct FastPathGate {
    entries: Vec<FastPathEntry>,
    availability: Box<dyn ToolAvailability>,
    whitelisted_roots: Vec<PathBuf>,
}

impl FastPathGate {
    /// Builds a gate from a set of entries, validating each entry's
    /// template at construction time (fail fast on an unsupported
    /// placeholder), and caching tool availability.
    ///
    /// # Panics
    ///
    /// Panics if any entry's `argv_template` references a placeholder other
    /// than `{url}` or `{outputDir}`.
    #[must_use]
    pub fn new(entries: Vec<FastPathEntry>, availability: Box<dyn ToolAvailability>) -> Self {
        for entry in &entries {
            if let Err(reason) = entry.validate_template() {
                panic!("invalid fast-path entry {:?}: {reason}", entry.id);
            }
        }
        Self {
            entries,
            availability,
            whitelisted_roots: default_whitelisted_roots(),
        }
    }

    /// Finds the first entry whose host patterns match `url` and whose tool
    /// is installed. `preferred_id`, if given, is checked first.
    #[must_use]
    pub fn find_entry(&self, url: &str, preferred_id: Option<&str>) -> Option<&FastPathEntry> {
        let host = crate::research::router::extract_host(url);
        let candidates = self.entries.iter().filter(|e| {
            preferred_id.is_none_or(|p| e.id == p) && e.host_patterns.iter().any(|re| re.is_match(&host))
        });

        candidates
            .filter(|e| self.availability.is_available(e.check_command))
            .next()
            .or_else(|| {
                self.entries
                    .iter()
                    .filter(|e| e.host_patterns.iter().any(|re| re.is_match(&host)))
                    .find(|e| self.availability.is_available(e.check_command))
            })
    }

    /// Validates `params` against `entry` and, if every check passes,
    /// returns an executable command. Any failed check returns `None`; the
    /// caller must fall through to the normal LLM loop.
    #[must_use]
    pub fn validate_and_build(
        &self,
        entry: &FastPathEntry,
        url: &str,
        output_dir: &Path,
        autonomy: AutonomyMode,
    ) -> Option<FastPathCommand> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return None;
        }

        if url.chars().any(|c| SHELL_DANGEROUS_CHARS.contains(&c)) {
            return None;
        }

        if autonomy == AutonomyMode::Restricted && !self.resolves_within_whitelist(output_dir) {
            return None;
        }

        let output_dir_str = output_dir.to_string_lossy();
        let argv: Vec<String> = entry
            .argv_template
            .iter()
            .map(|token| token.replace("{url}", url).replace("{outputDir}", &output_dir_str))
            .collect();

        if autonomy == AutonomyMode::Restricted
            && argv.iter().any(|tok| FORBIDDEN_PRIVILEGE_COMMANDS.contains(&tok.as_str()))
        {
            return None;
        }

        if !self.availability.is_available(entry.check_command) {
            return None;
        }

        Some(FastPathCommand {
            argv,
            timeout_ms: entry.timeout_ms,
        })
    }

    fn resolves_within_whitelist(&self, output_dir: &Path) -> bool {
        self.whitelisted_roots.iter().any(|root| output_dir.starts_with(root))
    }
}

fn default_whitelisted_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(dir) = dirs::download_dir() {
        roots.push(dir);
    }
    if let Some(dir) = dirs::desktop_dir() {
        roots.push(dir);
    }
    if let Some(dir) = dirs::document_dir() {
        roots.push(dir.join("Clawdia"));
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysAvailable;
    impl ToolAvailability for AlwaysAvailable {
        fn is_available(&self, _check_command: &str) -> bool {
            true
        }
    }

    struct NeverAvailable;
    impl ToolAvailability for NeverAvailable {
        fn is_available(&self, _check_command: &str) -> bool {
            false
        }
    }

    fn yt_dlp_entry() -> FastPathEntry {
        FastPathEntry {
            id: "yt-dlp",
            host_patterns: vec![Regex::new(r"youtube\.com$|youtu\.be$").unwrap()],
            argv_template: vec!["yt-dlp", "-o", "{outputDir}/%(title)s.%(ext)s", "{url}"],
            check_command: "yt-dlp",
            timeout_ms: 120_000,
        }
    }

    fn gate_with(availability: Box<dyn ToolAvailability>) -> FastPathGate {
        FastPathGate::new(vec![yt_dlp_entry()], availability)
    }

    #[test]
    fn rejects_non_http_urls() {
        let gate = gate_with(Box::new(AlwaysAvailable));
        let entry = gate.find_entry("https://www.youtube.com/watch?v=x", None).unwrap();
        let result = gate.validate_and_build(entry, "ftp://youtube.com/x", Path::new("/tmp"), AutonomyMode::Unrestricted);
        assert!(result.is_none());
    }

    #[test]
    fn rejects_shell_dangerous_characters() {
        let gate = gate_with(Box::new(AlwaysAvailable));
        let entry = &gate.entries[0];
        let result = gate.validate_and_build(
            entry,
            "https://example.com/;rm -rf /",
            Path::new("/tmp/Downloads"),
            AutonomyMode::Unrestricted,
        );
        assert!(result.is_none());
    }

    #[test]
    fn rejects_output_dir_outside_whitelist_when_restricted() {
        let gate = FastPathGate {
            entries: vec![yt_dlp_entry()],
            availability: Box::new(AlwaysAvailable),
            whitelisted_roots: vec![PathBuf::from("/home/user/Downloads")],
        };
        let entry = &gate.entries[0];
        let result = gate.validate_and_build(
            entry,
            "https://youtube.com/watch?v=1",
            Path::new("/etc"),
            AutonomyMode::Restricted,
        );
        assert!(result.is_none());
    }

    #[test]
    fn accepts_valid_request_within_whitelist() {
        let gate = FastPathGate {
            entries: vec![yt_dlp_entry()],
            availability: Box::new(AlwaysAvailable),
            whitelisted_roots: vec![PathBuf::from("/home/user/Downloads")],
        };
        let entry = &gate.entries[0];
        let result = gate.validate_and_build(
            entry,
            "https://youtube.com/watch?v=1",
            Path::new("/home/user/Downloads"),
            AutonomyMode::Restricted,
        );
        let command = result.unwrap();
        assert!(command.argv.contains(&"https://youtube.com/watch?v=1".to_string()));
    }

    #[test]
    fn rejects_when_tool_unavailable() {
        let gate = gate_with(Box::new(NeverAvailable));
        assert!(gate.find_entry("https://youtube.com/watch?v=1", None).is_none());
    }

    #[test]
    #[should_panic(expected = "unknown placeholder")]
    fn construction_rejects_unknown_placeholders() {
        let bad_entry = FastPathEntry {
            id: "bad",
            host_patterns: vec![Regex::new("example.com$").unwrap()],
            argv_template: vec!["tool", "{unsupported}"],
            check_command: "tool",
            timeout_ms: 1_000,
        };
        let _ = FastPathGate::new(vec![bad_entry], Box::new(AlwaysAvailable));
    }
}
