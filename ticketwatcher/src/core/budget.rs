//! Patch size budget checks.

use crate::core::diff::DiffStats;

/// Verdict of a budget check. `Exceeded` is a hard stop, never a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCheck {
    Ok,
    Exceeded {
        files_touched: usize,
        changed_lines: usize,
        max_files: usize,
        max_lines: usize,
    },
}

impl BudgetCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, BudgetCheck::Ok)
    }
}

/// Compare diff statistics against the configured ceilings.
pub fn check_budget(stats: DiffStats, max_files: usize, max_lines: usize) -> BudgetCheck {
    if stats.files_touched > max_files || stats.changed_lines > max_lines {
        return BudgetCheck::Exceeded {
            files_touched: stats.files_touched,
            changed_lines: stats.changed_lines,
            max_files,
            max_lines,
        };
    }
    BudgetCheck::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(files_touched: usize, changed_lines: usize) -> DiffStats {
        DiffStats {
            files_touched,
            changed_lines,
        }
    }

    #[test]
    fn limits_are_inclusive() {
        assert!(check_budget(stats(4, 200), 4, 200).is_ok());
        assert!(check_budget(stats(0, 0), 4, 200).is_ok());
    }

    #[test]
    fn either_limit_exceeds() {
        assert_eq!(
            check_budget(stats(5, 10), 4, 200),
            BudgetCheck::Exceeded {
                files_touched: 5,
                changed_lines: 10,
                max_files: 4,
                max_lines: 200,
            }
        );
        assert!(!check_budget(stats(1, 201), 4, 200).is_ok());
    }
}
