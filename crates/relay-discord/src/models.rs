//! Text rendering of the remote model catalogue for `/list_models`.

use relay_agent::ModelInfo;

/// Models shown per page.
pub const MODELS_PER_PAGE: usize = 5;
const DESCRIPTION_MAX: usize = 100;

/// Render `models` into pages of [`MODELS_PER_PAGE`] entries.
///
/// Always returns at least one page so callers can show "no models".
pub fn model_pages(models: &[ModelInfo]) -> Vec<String> {
    if models.is_empty() {
        return vec!["No models available.".to_string()];
    }
    let total = models.len().div_ceil(MODELS_PER_PAGE);
    models
        .chunks(MODELS_PER_PAGE)
        .enumerate()
        .map(|(i, page)| {
            let mut text = String::from("**\u{1f4da} Available Models**\n\n");
            for model in page {
                text.push_str(&format_entry(model));
            }
            text.push_str(&format!("\nPage {}/{}", i + 1, total));
            text
        })
        .collect()
}

/// Pick a 1-based page, clamping out-of-range requests to the nearest page.
pub fn select_page(pages: &[String], requested: Option<i64>) -> &str {
    let last = pages.len().saturating_sub(1);
    let index = requested
        .map(|p| {
            let page = usize::try_from(p.max(1)).unwrap_or(usize::MAX);
            (page - 1).min(last)
        })
        .unwrap_or(0);
    pages.get(index).map(|s| s.as_str()).unwrap_or("")
}

fn format_entry(model: &ModelInfo) -> String {
    let name = if model.name.is_empty() {
        &model.id
    } else {
        &model.name
    };
    let mut entry = format!(
        "\u{1f916} **{}**\n  \u{2570} *Model ID:* `{}`\n",
        name, model.id
    );
    let description = truncate_description(&model.description);
    if !description.is_empty() {
        entry.push_str(&format!("  \u{2570} {}\n", description));
    }
    entry
}

fn truncate_description(description: &str) -> String {
    let description = description.trim();
    if description.chars().count() > DESCRIPTION_MAX {
        let head: String = description.chars().take(DESCRIPTION_MAX).collect();
        format!("{head}...")
    } else {
        description.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(i: usize) -> ModelInfo {
        ModelInfo {
            id: format!("vendor/model-{i}"),
            name: format!("Model {i}"),
            description: String::new(),
        }
    }

    #[test]
    fn five_models_per_page() {
        let models: Vec<ModelInfo> = (0..12).map(model).collect();
        let pages = model_pages(&models);
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("`vendor/model-0`"));
        assert!(pages[0].contains("`vendor/model-4`"));
        assert!(!pages[0].contains("`vendor/model-5`"));
        assert!(pages[0].ends_with("Page 1/3"));
        assert!(pages[2].ends_with("Page 3/3"));
    }

    #[test]
    fn empty_catalogue_still_has_a_page() {
        assert_eq!(model_pages(&[]), vec!["No models available."]);
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let mut m = model(0);
        m.description = "d".repeat(150);
        let page = &model_pages(&[m])[0];
        assert!(page.contains(&format!("{}...", "d".repeat(100))));
        assert!(!page.contains(&"d".repeat(101)));
    }

    #[test]
    fn missing_name_falls_back_to_id() {
        let mut m = model(3);
        m.name.clear();
        assert!(model_pages(&[m])[0].contains("**vendor/model-3**"));
    }

    #[test]
    fn page_selection_clamps() {
        let pages = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(select_page(&pages, None), "a");
        assert_eq!(select_page(&pages, Some(2)), "b");
        assert_eq!(select_page(&pages, Some(0)), "a");
        assert_eq!(select_page(&pages, Some(-4)), "a");
        assert_eq!(select_page(&pages, Some(99)), "c");
        assert_eq!(select_page(&pages, Some(i64::MAX)), "c");
        assert_eq!(select_page(&pages, Some(i64::MIN)), "a");
    }
}
