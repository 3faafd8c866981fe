use logic_cache::Snapshot;
use logic_core::Value;
use logic_events::Timestamp;

use crate::contract::EvalResult;

/// Substitutes 1-based `%(n)` tokens in `pattern` with each source's
/// formatted current value (spec §3, §4.E "PatternFormat").
#[derive(Clone, Debug)]
pub struct PatternFormatVariant {
    pub pattern: String,
}

impl PatternFormatVariant {
    pub fn evaluate(&self, sources: &[Snapshot], out: &mut Value, _now: Timestamp) -> EvalResult {
        let mut result = String::with_capacity(self.pattern.len());
        let mut chars = self.pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' || chars.peek() != Some(&'(') {
                result.push(c);
                continue;
            }
            chars.next();
            let mut digits = String::new();
            while matches!(chars.peek(), Some(d) if d.is_ascii_digit()) {
                digits.push(chars.next().unwrap());
            }
            if chars.peek() != Some(&')') {
                result.push('%');
                result.push('(');
                result.push_str(&digits);
                continue;
            }
            chars.next();

            let index: usize = match digits.parse::<usize>() {
                Ok(n) if n >= 1 => n - 1,
                _ => return EvalResult::Error,
            };
            match sources.get(index) {
                Some(snapshot) if !snapshot.error => {
                    let text =
                        snapshot.value.as_ref().map(Value::format_text).unwrap_or_default();
                    result.push_str(&text);
                }
                _ => return EvalResult::Error,
            }
        }

        let previous = out.as_str().ok().map(str::to_string);
        out.set_string(result.clone()).expect("PatternFormat descriptor must declare value_type String");
        if previous.as_deref() == Some(result.as_str()) {
            EvalResult::Unchanged
        } else {
            EvalResult::NewValue
        }
    }
}
