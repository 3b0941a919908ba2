use crate::config::LayoutConfig;
use crate::text_metrics;
use crate::theme::Theme;

use super::TextBlock;

pub(super) fn measure_label(text: &str, theme: &Theme, config: &LayoutConfig) -> TextBlock {
    measure_label_with_font_size(text, theme.font_size, config, theme.font_family.as_str())
}

pub(super) fn measure_edge_label(text: &str, theme: &Theme, config: &LayoutConfig) -> TextBlock {
    let font_size = theme.font_size * config.edge_label_font_scale;
    measure_label_with_font_size(text, font_size, config, theme.font_family.as_str())
}

pub(super) fn measure_label_with_font_size(
    text: &str,
    font_size: f32,
    config: &LayoutConfig,
    font_family: &str,
) -> TextBlock {
    let fast_metrics = config.fast_text_metrics;
    let max_width_px = max_label_width_px(
        config.max_label_width_chars,
        font_size,
        font_family,
        fast_metrics,
    );
    let mut lines = Vec::new();
    for line in split_lines(text) {
        lines.extend(wrap_line(&line, max_width_px, font_size, font_family, fast_metrics));
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    let width = lines
        .iter()
        .map(|line| text_width(line, font_size, font_family, fast_metrics))
        .fold(0.0, f32::max);
    let height = lines.len() as f32 * font_size * config.label_line_height;

    TextBlock {
        lines,
        width,
        height,
    }
}

pub(super) fn char_width_factor(ch: char) -> f32 {
    // Approximate advance widths of a humanist sans at 1px, used when no
    // installed font can be measured.
    match ch {
        ' ' => 0.28,
        '.' | ',' | ':' | ';' | '|' | '!' | '\'' | 'i' | 'j' | 'l' => 0.26,
        '(' | ')' | '[' | ']' | '{' | '}' | 'f' | 't' | 'r' => 0.34,
        'm' | 'w' => 0.84,
        'M' | 'W' => 0.92,
        '@' | '#' | '%' | '&' => 0.9,
        c if c.is_ascii_uppercase() => 0.68,
        c if c.is_ascii_digit() => 0.6,
        c if c.is_ascii() => 0.55,
        // CJK and other wide scripts take roughly a full em.
        c if (c as u32) >= 0x2E80 => 1.0,
        _ => 0.6,
    }
}

pub(super) fn split_lines(text: &str) -> Vec<String> {
    let normalized = text
        .replace("\r\n", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n");
    normalized
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

pub(super) fn wrap_line(
    line: &str,
    max_width: f32,
    font_size: f32,
    font_family: &str,
    fast_metrics: bool,
) -> Vec<String> {
    if text_width(line, font_size, font_family, fast_metrics) <= max_width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, font_size, font_family, fast_metrics) > max_width
            && !current.is_empty()
        {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub(super) fn text_width(text: &str, font_size: f32, font_family: &str, fast_metrics: bool) -> f32 {
    if fast_metrics {
        return fallback_text_width(text, font_size);
    }
    text_metrics::measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| fallback_text_width(text, font_size))
}

fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

fn average_char_width(font_family: &str, font_size: f32, fast_metrics: bool) -> f32 {
    if fast_metrics {
        return font_size * 0.56;
    }
    text_metrics::average_char_width(font_family, font_size).unwrap_or(font_size * 0.56)
}

fn max_label_width_px(max_chars: usize, font_size: f32, font_family: &str, fast_metrics: bool) -> f32 {
    let avg_char = average_char_width(font_family, font_size, fast_metrics);
    (max_chars.max(1) as f32) * avg_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> LayoutConfig {
        LayoutConfig {
            fast_text_metrics: true,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn split_lines_handles_br_tags() {
        assert_eq!(split_lines("a<br/>b"), vec!["a", "b"]);
        assert_eq!(split_lines("a<br>b\r\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn fallback_text_width_scales_with_font_size() {
        let w16 = fallback_text_width("Transform", 16.0);
        let w32 = fallback_text_width("Transform", 32.0);
        assert!((w32 - w16 * 2.0).abs() < 0.01);
    }

    #[test]
    fn wrap_line_keeps_short_text() {
        assert_eq!(wrap_line("Load", 1000.0, 13.0, "sans-serif", true).len(), 1);
    }

    #[test]
    fn wrap_line_splits_long_text() {
        let lines = wrap_line(
            "normalize every record before the aggregation stage runs",
            100.0,
            13.0,
            "sans-serif",
            true,
        );
        assert!(lines.len() > 1, "expected wrapping, got {lines:?}");
        assert!(lines.iter().all(|line| !line.is_empty()));
    }

    #[test]
    fn measure_label_of_empty_text_has_one_line() {
        let block = measure_label("", &Theme::modern(), &fast_config());
        assert_eq!(block.lines.len(), 1);
        assert_eq!(block.width, 0.0);
        assert!(block.height > 0.0);
    }

    #[test]
    fn edge_labels_are_smaller() {
        let theme = Theme::modern();
        let config = fast_config();
        let node = measure_label("ast", &theme, &config);
        let edge = measure_edge_label("ast", &theme, &config);
        assert!(edge.width < node.width);
    }
}
