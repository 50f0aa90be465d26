use tracing::warn;

use crate::routes::{not_found, png_response, HttpResponse};
use crate::state::DemoState;

// ---------------------------------------------------------------------------
// GET /saliency/<file>
// ---------------------------------------------------------------------------

pub fn handle_get(name: &str, state: &DemoState) -> HttpResponse {
    if !is_safe_name(name) {
        warn!("rejected saliency path {:?}", name);
        return not_found();
    }
    match std::fs::read(state.config.saliency.output_dir.join(name)) {
        Ok(bytes) => png_response(bytes),
        Err(_) => not_found(),
    }
}

/// A bare `*.png` file name made of the characters saliency files are
/// written with; rules out traversal out of the output directory.
fn is_safe_name(name: &str) -> bool {
    name.len() > ".png".len()
        && name.ends_with(".png")
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_plain_png_names_are_served() {
        assert!(is_safe_name("0b9c2f4e-1d2a-4c5b-9e8f-001122334455-scan_1.png"));
        assert!(!is_safe_name("../secret.png"));
        assert!(!is_safe_name("a/b.png"));
        assert!(!is_safe_name("a%2F..%2Fb.png"));
        assert!(!is_safe_name(".png"));
        assert!(!is_safe_name("scan.jpg"));
    }
}
