use indicatif::ProgressStyle;

pub trait NamedProgress {
    fn named_bar(name: &str) -> Self;
}

impl NamedProgress for ProgressStyle {
    fn named_bar(name: &str) -> Self {
        let pad = 32usize.saturating_sub(name.len() + 1);
        let fmt = format!(
            "{}{} {{wide_bar:40.cyan/blue}} {{pos:>5}}/{{len:<5}} [{{elapsed_precise}} ({{eta}} remaining)] {{msg}}",
            name,
            " ".repeat(pad)
        );
        ProgressStyle::default_bar()
            .template(&fmt)
            .unwrap_or(ProgressStyle::default_bar())
    }
}
