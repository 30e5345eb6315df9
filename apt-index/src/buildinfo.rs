//! Typed view of `.buildinfo` control files.

use std::io::Read;

use crate::error::{IndexError, Result};
use crate::paragraph::{Paragraph, ParagraphReader};

/// One entry of the `Installed-Build-Depends` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDependency {
    /// Binary package name.
    pub name: String,
    /// Exact installed version.
    pub version: String,
    /// Architecture qualifier (`libc6:amd64`), when present.
    pub architecture: Option<String>,
}

impl BuildDependency {
    /// Parse one dependency clause, `name[:arch] (= version)`.
    pub fn parse(clause: &str) -> Result<Self> {
        let clause = clause.trim();
        let (name_part, rest) = match clause.split_once('(') {
            Some((n, r)) => (n.trim(), Some(r)),
            None => (clause, None),
        };
        if name_part.is_empty() {
            return Err(IndexError::invalid_field("Installed-Build-Depends", clause));
        }

        let version = match rest {
            Some(r) => {
                let inner = r
                    .strip_suffix(')')
                    .ok_or_else(|| IndexError::invalid_field("Installed-Build-Depends", clause))?;
                let version = inner
                    .trim()
                    .strip_prefix("=")
                    .ok_or_else(|| IndexError::invalid_field("Installed-Build-Depends", clause))?;
                version.trim().to_string()
            }
            None => {
                return Err(IndexError::invalid_field("Installed-Build-Depends", clause));
            }
        };

        let (name, architecture) = match name_part.split_once(':') {
            Some((n, a)) => (n.to_string(), Some(a.to_string())),
            None => (name_part.to_string(), None),
        };

        Ok(Self {
            name,
            version,
            architecture,
        })
    }

    /// Resolve the effective architecture against the build host
    /// architecture: `:all` stays `all`, no qualifier means the host arch.
    pub fn effective_architecture(&self, host_arch: &str) -> String {
        match self.architecture.as_deref() {
            Some(arch) => arch.to_string(),
            None => host_arch.to_string(),
        }
    }
}

/// The subset of a `.buildinfo` file the solver needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buildinfo {
    /// Source package the build produced.
    pub source: String,
    /// Host architecture of the build.
    pub build_architecture: String,
    /// Exact package versions installed during the build.
    pub installed_build_depends: Vec<BuildDependency>,
}

impl Buildinfo {
    /// Parse a buildinfo stream (first paragraph only).
    pub fn parse<R: Read>(input: R) -> Result<Self> {
        let mut reader = ParagraphReader::new(input);
        let paragraph = reader
            .next()
            .transpose()?
            .ok_or_else(|| IndexError::missing_field("Source"))?;
        Self::from_paragraph(&paragraph)
    }

    /// Build the view from an already-parsed paragraph.
    pub fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let mut installed_build_depends = Vec::new();
        for line in paragraph.block_lines("Installed-Build-Depends") {
            // the relation field is comma-delimited independent of how the
            // value is folded across lines
            for clause in line.split(',') {
                let clause = clause.trim();
                if clause.is_empty() {
                    continue;
                }
                installed_build_depends.push(BuildDependency::parse(clause)?);
            }
        }

        Ok(Self {
            source: paragraph.required("Source")?.to_string(),
            build_architecture: paragraph.required("Build-Architecture")?.to_string(),
            installed_build_depends,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILDINFO: &str = "\
Format: 1.0
Source: hello
Binary: hello
Architecture: amd64
Version: 2.10-2
Build-Architecture: amd64
Installed-Build-Depends:
 autoconf (= 2.69-14),
 base-files (= 11),
 libc6:amd64 (= 2.31-9),
 tzdata:all (= 2021a-0+deb11u1)
";

    #[test]
    fn test_parse_buildinfo() {
        let info = Buildinfo::parse(BUILDINFO.as_bytes()).unwrap();
        assert_eq!(info.source, "hello");
        assert_eq!(info.build_architecture, "amd64");
        assert_eq!(info.installed_build_depends.len(), 4);

        let autoconf = &info.installed_build_depends[0];
        assert_eq!(autoconf.name, "autoconf");
        assert_eq!(autoconf.version, "2.69-14");
        assert_eq!(autoconf.architecture, None);
        assert_eq!(autoconf.effective_architecture("amd64"), "amd64");

        let libc = &info.installed_build_depends[2];
        assert_eq!(libc.name, "libc6");
        assert_eq!(libc.architecture.as_deref(), Some("amd64"));

        let tzdata = &info.installed_build_depends[3];
        assert_eq!(tzdata.effective_architecture("amd64"), "all");
    }

    #[test]
    fn test_multiple_clauses_on_one_folded_line() {
        let input = "\
Source: hello
Build-Architecture: amd64
Installed-Build-Depends:
 autoconf (= 2.69-14), base-files (= 11),
 libc6:amd64 (= 2.31-9)
";
        let info = Buildinfo::parse(input.as_bytes()).unwrap();
        let names: Vec<&str> = info
            .installed_build_depends
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["autoconf", "base-files", "libc6"]);
        assert_eq!(info.installed_build_depends[1].version, "11");
        assert_eq!(
            info.installed_build_depends[2].architecture.as_deref(),
            Some("amd64")
        );
    }

    #[test]
    fn test_dependency_clause_errors() {
        assert!(BuildDependency::parse("name-only").is_err());
        assert!(BuildDependency::parse("pkg (>= 1.0)").is_err());
        assert!(BuildDependency::parse("pkg (= 1.0").is_err());
        assert!(BuildDependency::parse("(= 1.0)").is_err());
    }

    #[test]
    fn test_missing_host_arch_is_fatal() {
        let input = "Source: hello\nInstalled-Build-Depends:\n base-files (= 11)\n";
        assert!(Buildinfo::parse(input.as_bytes()).is_err());
    }
}
