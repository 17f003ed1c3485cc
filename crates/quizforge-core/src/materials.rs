//! Reference-material links for a topic.

use url::Url;

use crate::locale::Locale;
use crate::model::MaterialLink;
use crate::topics::topic_label;

/// Search pages: (source, display title, base url, query parameter).
const SEARCH_PAGES: &[(&str, &str, &str, &str)] = &[
    ("google", "Google", "https://www.google.com/search", "q"),
    ("youtube", "YouTube", "https://www.youtube.com/results", "search_query"),
    ("wikipedia", "Wikipedia", "https://{wiki}/w/index.php", "search"),
    ("habr", "Habr", "https://habr.com/ru/search/", "q"),
    ("stepik", "Stepik", "https://stepik.org/catalog/search", "q"),
];

/// Deterministic search links for `topic_code` within `subject_name`.
pub fn build_material_links(topic_code: &str, subject_name: &str, locale: Locale) -> Vec<MaterialLink> {
    let label = topic_label(topic_code);
    let query = format!("{} {}", subject_name.trim(), label).trim().to_string();

    SEARCH_PAGES
        .iter()
        .filter_map(|(source, title, base, param)| {
            let base = base.replace("{wiki}", locale.wiki_domain());
            let url = Url::parse_with_params(&base, &[(*param, query.as_str())]).ok()?;
            Some(MaterialLink {
                title: format!("{title}: {label}"),
                url: url.to_string(),
                source: source.to_string(),
            })
        })
        .collect()
}
