use crate::error::Result;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::model::{MatchOutcome, WindowAction, WindowFilter, WindowRecord, WindowSnapshot};

/// Критерий, который реально участвует в сравнении.
/// Выбирается ровно один, объединения критериев не бывает.
#[derive(Debug)]
enum Criterion {
    ClassExact(String),
    ClassPattern(Regex),
    CaptionPattern(Regex),
}

/// Чистый выбор окна: тот же алгоритм, что выполняется внутри KWin
#[derive(Debug)]
pub struct Matcher {
    criterion: Criterion,
    current_desktop_only: bool,
}

impl Matcher {
    pub fn new(filter: &WindowFilter) -> Result<Self> {
        let criterion = if !filter.class_exact.is_empty() {
            Criterion::ClassExact(filter.class_exact.clone())
        } else if !filter.class_pattern.is_empty() {
            Criterion::ClassPattern(Regex::new(&filter.class_pattern)?)
        } else {
            Criterion::CaptionPattern(
                RegexBuilder::new(&filter.caption_pattern)
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            criterion,
            current_desktop_only: filter.current_desktop_only,
        })
    }

    fn matches(&self, window: &WindowRecord, current_desktop: Option<&str>) -> bool {
        let hit = match &self.criterion {
            Criterion::ClassExact(class) => window.class == *class,
            Criterion::ClassPattern(re) => re.is_match(&window.class),
            Criterion::CaptionPattern(re) => re.is_match(&window.caption),
        };

        hit && (!self.current_desktop_only || window.desktops.includes(current_desktop))
    }

    /// Кандидаты в порядке снимка
    pub fn candidates(&self, snapshot: &WindowSnapshot) -> Vec<WindowRecord> {
        let current_desktop = snapshot.current_desktop.as_deref();
        snapshot
            .windows
            .iter()
            .filter(|w| self.matches(w, current_desktop))
            .cloned()
            .collect()
    }

    pub fn select(&self, snapshot: &WindowSnapshot, toggle: bool) -> MatchOutcome {
        let mut candidates = self.candidates(snapshot);
        debug!("Найдено кандидатов: {}", candidates.len());

        let (winner, action) = match candidates.len() {
            0 => (None, WindowAction::None),
            1 => {
                let only = candidates[0].clone();
                let action = if !only.is_active {
                    WindowAction::Activate
                } else if toggle {
                    WindowAction::ToggleMinimize
                } else {
                    WindowAction::None
                };
                (Some(only), action)
            }
            _ => {
                let active_is_candidate = candidates.iter().any(|w| w.is_active);
                candidates.sort_by_key(|w| w.stacking_order);

                // Уже в этом приложении - переходим к первому окну, иначе к последнему поднятому
                let winner = if active_is_candidate {
                    candidates.first()
                } else {
                    candidates.last()
                };
                (winner.cloned(), WindowAction::Activate)
            }
        };

        MatchOutcome {
            candidates,
            winner,
            action,
        }
    }
}

/// `match(snapshot, filter)` одним вызовом
pub fn match_windows(snapshot: &WindowSnapshot, filter: &WindowFilter, toggle: bool) -> Result<MatchOutcome> {
    Ok(Matcher::new(filter)?.select(snapshot, toggle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::model::DesktopMembership;

    fn window(class: &str, caption: &str, order: i64) -> WindowRecord {
        WindowRecord::new(class, caption)
            .with_id(format!("{}-{}", class, order))
            .with_stacking_order(order)
    }

    fn orders(windows: &[WindowRecord]) -> Vec<i64> {
        windows.iter().map(|w| w.stacking_order).collect()
    }

    #[test]
    fn test_class_exact_beats_pattern_and_caption() {
        let snapshot = WindowSnapshot::new(vec![
            window("firefox", "Mozilla", 1),
            window("firefox-dev", "Dev", 2),
            window("konsole", "firefox docs", 3),
        ]);
        let filter = WindowFilter {
            class_exact: "firefox".into(),
            class_pattern: "fire".into(),
            caption_pattern: "firefox".into(),
            current_desktop_only: false,
        };

        let outcome = match_windows(&snapshot, &filter, false).unwrap();
        assert_eq!(orders(&outcome.candidates), vec![1]);
    }

    #[test]
    fn test_class_pattern_beats_caption() {
        let snapshot = WindowSnapshot::new(vec![
            window("firefox", "Mozilla", 1),
            window("firefox-dev", "Dev", 2),
            window("konsole", "firefox docs", 3),
        ]);
        let filter = WindowFilter {
            class_pattern: "^fire".into(),
            caption_pattern: "docs".into(),
            ..WindowFilter::default()
        };

        let outcome = match_windows(&snapshot, &filter, false).unwrap();
        assert_eq!(orders(&outcome.candidates), vec![1, 2]);
    }

    #[test]
    fn test_exact_class_is_case_sensitive() {
        let snapshot = WindowSnapshot::new(vec![window("Firefox", "a", 1)]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_class("firefox"), false).unwrap();
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.action, WindowAction::None);
    }

    #[test]
    fn test_class_pattern_is_unanchored_search() {
        let snapshot = WindowSnapshot::new(vec![window("org.kde.dolphin", "Home", 1)]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_class_pattern("dolph"), false).unwrap();
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[test]
    fn test_caption_is_case_insensitive() {
        let snapshot = WindowSnapshot::new(vec![window("code", "README.md - Visual Studio Code", 1)]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_caption("visual studio"), false).unwrap();
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[test]
    fn test_empty_caption_matches_everything() {
        let snapshot = WindowSnapshot::new(vec![window("a", "x", 1), window("b", "", 2)]);
        let matcher = Matcher::new(&WindowFilter::default()).unwrap();
        assert_eq!(matcher.candidates(&snapshot).len(), 2);
    }

    #[test]
    fn test_current_desktop_filter() {
        let snapshot = WindowSnapshot::new(vec![
            window("konsole", "one", 1).with_desktops(DesktopMembership::Desktops(vec!["d1".into()])),
            window("konsole", "two", 2).with_desktops(DesktopMembership::Desktops(vec!["d2".into()])),
            window("konsole", "all", 3).with_desktops(DesktopMembership::All),
            window("konsole", "unknown", 4),
        ])
        .on_desktop("d1");

        let filter = WindowFilter::by_class("konsole").on_current_desktop();
        let outcome = match_windows(&snapshot, &filter, false).unwrap();
        assert_eq!(orders(&outcome.candidates), vec![1, 3, 4]);
    }

    #[test]
    fn test_single_inactive_candidate_is_activated() {
        let snapshot = WindowSnapshot::new(vec![window("dolphin", "Home", 4)]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_class("dolphin"), true).unwrap();
        assert_eq!(outcome.action, WindowAction::Activate);
        assert_eq!(outcome.winner.unwrap().stacking_order, 4);
    }

    #[test]
    fn test_single_active_candidate_without_toggle_does_nothing() {
        let snapshot = WindowSnapshot::new(vec![window("dolphin", "Home", 4).active()]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_class("dolphin"), false).unwrap();
        assert_eq!(outcome.action, WindowAction::None);
        assert!(outcome.winner.is_some());
    }

    #[test]
    fn test_single_active_candidate_with_toggle_minimizes() {
        let snapshot = WindowSnapshot::new(vec![window("dolphin", "Home", 4).active()]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_class("dolphin"), true).unwrap();
        assert_eq!(outcome.action, WindowAction::ToggleMinimize);
    }

    #[test]
    fn test_multiple_candidates_cycle_to_lowest_when_active_is_sibling() {
        let snapshot = WindowSnapshot::new(vec![
            window("konsole", "a", 2).active(),
            window("konsole", "b", 5),
            window("konsole", "c", 1),
        ]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_class("konsole"), true).unwrap();
        assert_eq!(orders(&outcome.candidates), vec![1, 2, 5]);
        assert_eq!(outcome.winner.unwrap().stacking_order, 1);
        assert_eq!(outcome.action, WindowAction::Activate);
    }

    #[test]
    fn test_multiple_candidates_switch_to_highest_when_no_sibling_active() {
        let snapshot = WindowSnapshot::new(vec![
            window("konsole", "a", 2),
            window("konsole", "b", 5),
            window("konsole", "c", 1),
            window("kate", "notes", 9).active(),
        ]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_class("konsole"), false).unwrap();
        assert_eq!(outcome.winner.unwrap().stacking_order, 5);
        assert_eq!(outcome.action, WindowAction::Activate);
    }

    #[test]
    fn test_two_firefox_windows_pick_most_recent() {
        let snapshot = WindowSnapshot::new(vec![window("firefox", "a", 3), window("firefox", "b", 7)]);
        let outcome = match_windows(&snapshot, &WindowFilter::by_class("firefox"), false).unwrap();
        assert_eq!(outcome.winner.unwrap().stacking_order, 7);
        assert_eq!(outcome.action, WindowAction::Activate);
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        assert!(Matcher::new(&WindowFilter::by_class_pattern("(")).is_err());
    }
}
