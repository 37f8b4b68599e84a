pub const NAME_TOKEN: &str = "{{name}}";

/// Used in place of the name when a recipient has none.
pub const DEFAULT_FALLBACK_NAME: &str = "there";

pub fn personalize(content: &str, name: &str) -> String {
    personalize_with_fallback(content, name, DEFAULT_FALLBACK_NAME)
}

/// Replaces every `{{name}}` in `content` with `name`, or with `fallback` when
/// `name` is blank. Nothing else in the content is interpreted.
pub fn personalize_with_fallback(content: &str, name: &str, fallback: &str) -> String {
    let name = match name.trim() {
        "" => fallback,
        name => name,
    };

    content.replace(NAME_TOKEN, name)
}
