// Completion gates - markdown checklist

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::LoopState;
use crate::gates::traits::{Gate, GateOutcome};

pub const CHECKLIST_GATE: &str = "checklist";

/// Checked/total counts of a checklist document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecklistProgress {
    pub checked: usize,
    pub total: usize,
}

impl ChecklistProgress {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.checked == self.total
    }
}

/// Count checkbox items (`- [ ]`, `* [x]`, `+ [X]`, `1. [ ]`), ignoring
/// anything inside fenced code blocks.
pub fn count_items(content: &str) -> ChecklistProgress {
    let mut progress = ChecklistProgress::default();
    let mut in_fence = false;

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let Some(rest) = strip_list_marker(trimmed) else {
            continue;
        };
        let Some(mark) = checkbox_mark(rest) else {
            continue;
        };

        progress.total += 1;
        if mark {
            progress.checked += 1;
        }
    }

    progress
}

fn strip_list_marker(line: &str) -> Option<&str> {
    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest.trim_start());
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(str::trim_start)
}

/// Some(true) for a checked box, Some(false) for an open one.
fn checkbox_mark(rest: &str) -> Option<bool> {
    let checked = match rest.get(..3)? {
        "[ ]" => false,
        "[x]" | "[X]" => true,
        _ => return None,
    };
    match rest[3..].chars().next() {
        None | Some(' ') | Some('\t') => Some(checked),
        _ => None,
    }
}

/// Every checkbox item in the checklist must be checked.
pub struct ChecklistGate {
    path: PathBuf,
    optional: bool,
}

impl ChecklistGate {
    pub fn new(path: impl Into<PathBuf>, optional: bool) -> Self {
        Self {
            path: path.into(),
            optional,
        }
    }

    fn absent(&self, what: &str) -> GateOutcome {
        if self.optional {
            GateOutcome::pass(format!("checklist {} (optional)", what))
        } else {
            GateOutcome::fail(format!("checklist {} at {}", what, self.path.display()))
        }
    }
}

impl Gate for ChecklistGate {
    fn name(&self) -> &str {
        CHECKLIST_GATE
    }

    fn check(&self, repo_root: &Path, _state: &LoopState) -> GateOutcome {
        let content = match fs::read(repo_root.join(&self.path)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => return self.absent("missing"),
        };

        let progress = count_items(&content);
        if progress.total == 0 {
            return self.absent("has no items");
        }

        let detail = format!("{}/{} items checked", progress.checked, progress.total);
        if progress.is_complete() {
            GateOutcome::pass(detail)
        } else {
            GateOutcome::fail(detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CHECKLIST: &str = r#"# Tasks

- [x] parse config
- [ ] wire scheduler
* [X] write tests
  + [ ] nested item
1. [x] numbered
2) [ ] paren numbered
- [x]trailing text is not a box
- plain bullet

```
- [ ] inside code fence
```
"#;

    #[test]
    fn test_count_items() {
        let progress = count_items(CHECKLIST);
        assert_eq!(progress.total, 6);
        assert_eq!(progress.checked, 3);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_count_items_complete() {
        let progress = count_items("- [x] one\n- [X] two\n");
        assert!(progress.is_complete());
    }

    #[test]
    fn test_empty_is_not_complete() {
        assert!(!count_items("# nothing here").is_complete());
    }

    fn check(content: Option<&str>, optional: bool) -> GateOutcome {
        let temp = TempDir::new().unwrap();
        if let Some(content) = content {
            fs::write(temp.path().join("checklist.md"), content).unwrap();
        }
        ChecklistGate::new("checklist.md", optional).check(temp.path(), &LoopState::new())
    }

    #[test]
    fn test_gate_incomplete() {
        let outcome = check(Some(CHECKLIST), false);
        assert!(!outcome.passed);
        assert_eq!(outcome.reason, "3/6 items checked");
    }

    #[test]
    fn test_gate_complete() {
        assert!(check(Some("- [x] done\n"), false).passed);
    }

    #[test]
    fn test_missing_checklist_required() {
        let outcome = check(None, false);
        assert!(!outcome.passed);
        assert!(outcome.reason.contains("missing"));
    }

    #[test]
    fn test_missing_checklist_optional() {
        assert!(check(None, true).passed);
    }

    #[test]
    fn test_itemless_checklist() {
        assert!(!check(Some("just prose\n"), false).passed);
        assert!(check(Some("just prose\n"), true).passed);
    }
}
