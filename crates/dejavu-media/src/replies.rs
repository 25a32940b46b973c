//! Reply texts and rendering.

use dejavu_core::message_link;

/// Header sent to a new message that matched earlier media.
pub const DUPLICATE_HEADER: &str = "🕵️‍♀️ Здається, я це вже десь бачив...";

/// Phrasings rotated across consecutive duplicate alerts.
pub const DUPLICATE_VARIANTS: [&str; 5] = ["ось тут", "ще тут", "і ось", "навіть це", "і оце щось схоже"];

pub const RETRIEVAL_HEADER: &str = "🔎 Ось, що мені вдалось знайти:";
pub const RETRIEVAL_NOTHING_FOUND: &str = "🤷‍♂️ Нічого нема.";
pub const RETRIEVAL_END: &str = "💃 Це все!";
pub const RETRIEVAL_MORE_LABEL: &str = "Ще";
pub const RETRIEVAL_FAILED: &str = "📛 Халепа!";
pub const RETRIEVAL_EXPIRED: &str = "⌛ Цей пошук вже застарів, повтори команду.";

pub const IMPORT_BUSY: &str = "😡 Я тут працюю, тужуся, а ти відволікаєш.";
pub const IMPORT_NOTHING_TO_DO: &str = "🍧 Нема потреби. Усе же зроблено.";
pub const IMPORT_STARTED: &str = "🏃 Взяв у роботу!";
pub const IMPORT_DONE: &str = "😮‍💨 Фух... Усе підтягнув!";
pub const IMPORT_FAILED: &str = "📛 Халепа!";

pub const IGNORE_NOT_A_REPLY: &str = "⚠️ Використовуй цю команду як reply на фото або відео.";
pub const IGNORE_NOT_MEDIA: &str = "⚠️ Ця команда працює тільки з фото або відео.";
pub const IGNORE_ALREADY: &str = "ℹ️ Це медіа вже є у списку ігнорування.";
pub const IGNORE_ADDED: &str = "✅ Медіа додано до списку ігнорування.";
pub const IGNORE_FAILED: &str = "📛 Сталася помилка при додаванні медіа до списку ігнорування.";

/// Usage hint for the search command without a query.
pub fn search_usage(command: &str) -> String {
    format!(
        "ℹ️ Додай пошуковий запит після команди, наприклад: /{} ігрова консоль",
        command
    )
}

/// Similarity as a percentage rounded to two decimals.
pub fn similarity_percent(similarity: f32) -> f64 {
    (f64::from(similarity) * 1e4).round() / 1e2
}

/// Format a number with `digits` significant digits in fixed notation.
pub fn significant(value: f64, digits: u32) -> String {
    let digits = digits.max(1) as i32;
    if value == 0.0 || !value.is_finite() {
        return format!("{:.*}", (digits - 1) as usize, value);
    }
    // Exponent after rounding, so 0.99996 counts as 1.000 and not 0.9999x.
    let scientific = format!("{:.*e}", (digits - 1) as usize, value);
    let magnitude = scientific
        .rsplit('e')
        .next()
        .and_then(|exp| exp.parse::<i32>().ok())
        .unwrap_or(0);
    let decimals = (digits - 1 - magnitude).max(0) as usize;
    format!("{:.*}", decimals, value)
}

/// Text of the `position`-th duplicate alert.
pub fn duplicate_alert(position: usize, chat_id: i64, message_id: i64, similarity: f32) -> String {
    format!(
        "{} ({}%)\n{}",
        DUPLICATE_VARIANTS[position % DUPLICATE_VARIANTS.len()],
        similarity_percent(similarity),
        message_link(chat_id, message_id)
    )
}

/// Text of one retrieval match.
pub fn retrieval_match(query: &str, similarity: f32) -> String {
    format!("{} ({})", query, significant(f64::from(similarity), 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_percent_rounds_to_two_decimals() {
        assert_eq!(similarity_percent(0.975_349), 97.53);
        assert_eq!(similarity_percent(1.0), 100.0);
        assert_eq!(similarity_percent(0.96).to_string(), "96");
    }

    #[test]
    fn test_significant_digits() {
        assert_eq!(significant(0.273_456, 4), "0.2735");
        assert_eq!(significant(0.031_234_5, 4), "0.03123");
        assert_eq!(significant(1.0, 4), "1.000");
        assert_eq!(significant(0.0, 4), "0.000");
    }

    #[test]
    fn test_significant_digits_when_rounding_carries() {
        assert_eq!(significant(0.999_96, 4), "1.000");
        assert_eq!(significant(9.999_6, 4), "10.00");
        assert_eq!(significant(0.099_996, 4), "0.1000");
        assert_eq!(retrieval_match("cat", 0.999_96), "cat (1.000)");
    }

    #[test]
    fn test_duplicate_alert_rotates_and_links() {
        let first = duplicate_alert(0, -1001234567890, 55, 0.98);
        assert!(first.starts_with("ось тут (98%)"));
        assert!(first.ends_with("https://t.me/c/1234567890/55"));

        let sixth = duplicate_alert(5, -1001234567890, 56, 0.98);
        assert!(sixth.starts_with("ось тут"));
        assert!(duplicate_alert(1, 1, 1, 0.97).starts_with("ще тут"));
    }

    #[test]
    fn test_retrieval_match_text() {
        assert_eq!(retrieval_match("red car", 0.312_34), "red car (0.3123)");
    }

    #[test]
    fn test_search_usage_names_command() {
        assert!(search_usage("searchmedia").contains("/searchmedia"));
    }
}
