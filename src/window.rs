//! Locating the editor's input surface among the host's windows.

use tracing::debug;

use crate::platform::{Platform, ProcessId, WindowHandle};

/// Find the window of class `class_name` belonging to process `pid`.
///
/// Top-level windows are walked in z-order. For each one owned by `pid`, the
/// window itself is returned if its class matches (ignoring case), otherwise
/// its immediate children are searched. The first qualifying window wins, so
/// with several matching windows the result follows z-order, not creation
/// order.
pub fn resolve<P: Platform>(platform: &P, pid: ProcessId, class_name: &str) -> Option<WindowHandle> {
    let wanted = class_name.to_lowercase();
    let mut current = platform.top_window();
    while let Some(window) = current {
        if platform.window_process_id(window) == Some(pid) {
            let own_class = platform.class_name(window).unwrap_or_default();
            if own_class.to_lowercase() == wanted {
                debug!(window = window.0, pid, class_name, "matched top-level window");
                return Some(window);
            }
            if let Some(child) = platform.find_child(window, class_name) {
                debug!(window = child.0, parent = window.0, pid, class_name, "matched child window");
                return Some(child);
            }
        }
        current = platform.next_window(window);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{FakePlatform, FakeWindow};

    #[test]
    fn test_resolve_returns_first_matching_window_for_pid() {
        let host = FakePlatform::new()
            .with_window(FakeWindow::top_level(1, 5, "X"))
            .with_window(FakeWindow::top_level(2, 7, "Edit"))
            .with_window(FakeWindow::top_level(3, 7, "Y"));
        assert_eq!(resolve(&host, 7, "Edit"), Some(WindowHandle(2)));
    }

    #[test]
    fn test_resolve_ignores_matching_class_of_other_process() {
        let host = FakePlatform::new()
            .with_window(FakeWindow::top_level(1, 5, "Edit"))
            .with_window(FakeWindow::top_level(2, 7, "Notepad"));
        assert_eq!(resolve(&host, 7, "Edit"), None);
    }

    #[test]
    fn test_resolve_descends_into_children() {
        let host = FakePlatform::new()
            .with_window(FakeWindow::top_level(1, 7, "Notepad"))
            .with_window(FakeWindow::child_of(10, 1, 7, "StatusBar"))
            .with_window(FakeWindow::child_of(11, 1, 7, "EDIT"));
        assert_eq!(resolve(&host, 7, "edit"), Some(WindowHandle(11)));
    }

    #[test]
    fn test_resolve_prefers_earlier_window_in_z_order() {
        let host = FakePlatform::new()
            .with_window(FakeWindow::top_level(1, 7, "Notepad"))
            .with_window(FakeWindow::child_of(10, 1, 7, "Edit"))
            .with_window(FakeWindow::top_level(2, 7, "Edit"));
        assert_eq!(resolve(&host, 7, "Edit"), Some(WindowHandle(10)));
    }

    #[test]
    fn test_resolve_on_empty_desktop() {
        assert_eq!(resolve(&FakePlatform::new(), 7, "Edit"), None);
    }
}
