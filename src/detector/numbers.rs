use crate::types::NumberSet;

/// Extract every special number referenced by one bet line.
///
/// Each maximal run of decimal digits is read as one integer; runs outside
/// 1..=49 are discarded and repeats collapse. ASCII and full-width digits
/// (`０`-`９`, common in exported sheets) are both accepted. Text without a
/// valid number yields an empty set.
pub fn extract_numbers(content: &str) -> NumberSet {
    let mut set = NumberSet::EMPTY;
    let mut run: Option<u64> = None;

    for ch in content.chars() {
        match digit_value(ch) {
            Some(d) => {
                // Saturate so absurdly long runs stay out of range instead of overflowing.
                let value = run.unwrap_or(0).saturating_mul(10).saturating_add(d);
                run = Some(value);
            }
            None => {
                if let Some(value) = run.take() {
                    push_run(&mut set, value);
                }
            }
        }
    }
    if let Some(value) = run {
        push_run(&mut set, value);
    }

    set
}

fn digit_value(ch: char) -> Option<u64> {
    match ch {
        '0'..='9' => Some(ch as u64 - '0' as u64),
        '０'..='９' => Some(ch as u64 - '０' as u64),
        _ => None,
    }
}

fn push_run(set: &mut NumberSet, value: u64) {
    if let Ok(n) = u32::try_from(value) {
        set.insert(n);
    }
}
