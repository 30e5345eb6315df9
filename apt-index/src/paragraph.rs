//! Streaming reader for RFC822-style control paragraphs.
//!
//! Debian index files are sequences of paragraphs separated by blank lines.
//! Each paragraph is a list of `Field: value` lines where lines starting
//! with whitespace continue the previous field. The reader yields one
//! paragraph at a time so multi-hundred-megabyte `Packages` files never
//! have to be materialized in full.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};

use crate::error::{IndexError, Result};

/// A single parsed control paragraph.
///
/// Field names are matched case-insensitively, as APT does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    fields: HashMap<String, String>,
}

impl Paragraph {
    /// Look up a field value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    /// Look up a field value, erroring when absent.
    pub fn required(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| IndexError::missing_field(name))
    }

    /// Parse a required field into an integer.
    pub fn required_u64(&self, name: &str) -> Result<u64> {
        let value = self.required(name)?;
        value
            .parse::<u64>()
            .map_err(|_| IndexError::invalid_field(name, value))
    }

    /// Split a multi-line block field (e.g. `SHA256` in a Release file or
    /// `Checksums-Sha256` in a Sources paragraph) into its non-empty lines.
    pub fn block_lines(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .map(|v| {
                v.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of fields in the paragraph.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the paragraph has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn insert(&mut self, name: String, value: String) {
        self.fields.insert(name.to_lowercase(), value);
    }
}

/// Iterator over the paragraphs of a control stream.
pub struct ParagraphReader<R: Read> {
    reader: BufReader<R>,
    done: bool,
}

impl<R: Read> ParagraphReader<R> {
    /// Create a reader over an (already decompressed) byte stream.
    pub fn new(input: R) -> Self {
        Self {
            reader: BufReader::new(input),
            done: false,
        }
    }

    fn read_paragraph(&mut self) -> Result<Option<Paragraph>> {
        let mut paragraph = Paragraph::default();
        let mut current: Option<(String, String)> = None;
        let mut line = String::new();

        loop {
            line.clear();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                self.done = true;
                break;
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);

            if trimmed.trim().is_empty() {
                if current.is_some() || !paragraph.is_empty() {
                    break;
                }
                // leading blank lines
                continue;
            }

            if trimmed.starts_with(' ') || trimmed.starts_with('\t') {
                match current {
                    Some((_, ref mut value)) => {
                        value.push('\n');
                        value.push_str(trimmed.trim_start());
                    }
                    None => return Err(IndexError::MalformedLine(trimmed.to_string())),
                }
            } else if let Some((field, value)) = trimmed.split_once(':') {
                if let Some((name, value)) = current.take() {
                    paragraph.insert(name, value);
                }
                current = Some((field.trim().to_string(), value.trim().to_string()));
            } else {
                return Err(IndexError::MalformedLine(trimmed.to_string()));
            }
        }

        if let Some((name, value)) = current {
            paragraph.insert(name, value);
        }
        if paragraph.is_empty() {
            Ok(None)
        } else {
            Ok(Some(paragraph))
        }
    }
}

impl<R: Read> Iterator for ParagraphReader<R> {
    type Item = Result<Paragraph>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            match self.read_paragraph() {
                Ok(Some(paragraph)) => return Some(Ok(paragraph)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_paragraph() {
        let input = "Package: hello\nVersion: 2.10-2\n";
        let paragraphs: Vec<_> = ParagraphReader::new(input.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].get("Package"), Some("hello"));
        assert_eq!(paragraphs[0].get("package"), Some("hello"));
        assert_eq!(paragraphs[0].get("Missing"), None);
    }

    #[test]
    fn test_multiple_paragraphs() {
        let input = "Package: a\nVersion: 1\n\n\nPackage: b\nVersion: 2\n\n";
        let paragraphs: Vec<_> = ParagraphReader::new(input.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].get("package"), Some("a"));
        assert_eq!(paragraphs[1].get("package"), Some("b"));
    }

    #[test]
    fn test_folded_continuation() {
        let input = "Package: hello\nDescription: greeter\n the classic\n program\n";
        let paragraphs: Vec<_> = ParagraphReader::new(input.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            paragraphs[0].get("description"),
            Some("greeter\nthe classic\nprogram")
        );
    }

    #[test]
    fn test_block_lines() {
        let input = "SHA256:\n abc 10 dists/x/Release\n def 20 dists/y/Release\n";
        let paragraphs: Vec<_> = ParagraphReader::new(input.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        let lines = paragraphs[0].block_lines("sha256");
        assert_eq!(lines, vec!["abc 10 dists/x/Release", "def 20 dists/y/Release"]);
    }

    #[test]
    fn test_malformed_line() {
        let input = "Package hello\n";
        let result: Result<Vec<_>> = ParagraphReader::new(input.as_bytes()).collect();
        assert!(matches!(result, Err(IndexError::MalformedLine(_))));
    }

    #[test]
    fn test_continuation_without_field() {
        let input = " dangling\n";
        let result: Result<Vec<_>> = ParagraphReader::new(input.as_bytes()).collect();
        assert!(matches!(result, Err(IndexError::MalformedLine(_))));
    }

    #[test]
    fn test_required_u64() {
        let input = "Size: 12345\nBad: x\n";
        let paragraph = ParagraphReader::new(input.as_bytes())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(paragraph.required_u64("Size").unwrap(), 12345);
        assert!(paragraph.required_u64("Bad").is_err());
        assert!(matches!(
            paragraph.required_u64("Absent"),
            Err(IndexError::MissingField(_))
        ));
    }
}
