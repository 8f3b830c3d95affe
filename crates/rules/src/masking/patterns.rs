//! Pattern families for the `mask` transform.

use crate::config::EffectiveConfig;

/// Masking layout selected by the `pattern` config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskPattern {
    /// 15 or 18 character national ID.
    IdCard,
    /// 12 to 19 digit card number.
    BankCard,
    /// Personal name, masked per character.
    PersonalName,
    Email,
    /// Phone number, keeps 3 leading and 4 trailing digits by default.
    Phone,
    /// `keep_start` / `keep_end` driven.
    Generic,
}

impl MaskPattern {
    pub fn from_config(config: &EffectiveConfig) -> Result<Self, String> {
        match config.str("pattern") {
            None | Some("") | Some("generic") => Ok(MaskPattern::Generic),
            Some("id_card") => Ok(MaskPattern::IdCard),
            Some("bank_card") => Ok(MaskPattern::BankCard),
            Some("chinese_name") | Some("name") => Ok(MaskPattern::PersonalName),
            Some("email") => Ok(MaskPattern::Email),
            Some("phone") => Ok(MaskPattern::Phone),
            Some(other) => Err(format!("unknown mask pattern '{}'", other)),
        }
    }

    pub fn apply(self, value: &str, config: &EffectiveConfig) -> Result<String, String> {
        let mask = config.str_or("mask_char", "*");
        match self {
            MaskPattern::IdCard => mask_id_card(value, mask),
            MaskPattern::BankCard => {
                mask_bank_card(value, mask, config.bool_or("group_format", false))
            }
            MaskPattern::PersonalName => Ok(mask_name(value, mask)),
            MaskPattern::Email => {
                mask_email(value, mask, config.usize_or("keep_username_chars", 2))
            }
            MaskPattern::Phone => Ok(keep_ends(
                value,
                mask,
                config.usize_or("keep_start", 3),
                config.usize_or("keep_end", 4),
            )),
            MaskPattern::Generic => Ok(keep_ends(
                value,
                mask,
                config.usize_or("keep_start", 0),
                config.usize_or("keep_end", 0),
            )),
        }
    }
}

/// Keep `start` leading and `end` trailing characters, mask the rest.
/// Fully masked when the kept parts would cover the whole value.
fn keep_ends(value: &str, mask: &str, start: usize, end: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    if start.saturating_add(end) >= len {
        return mask.repeat(len);
    }
    let mut out = String::with_capacity(value.len());
    out.extend(&chars[..start]);
    out.push_str(&mask.repeat(len - start - end));
    out.extend(&chars[len - end..]);
    out
}

fn mask_id_card(value: &str, mask: &str) -> Result<String, String> {
    let id = value.trim();
    let len = id.chars().count();
    let well_formed = id.char_indices().all(|(i, c)| {
        c.is_ascii_digit() || (i + 1 == id.len() && matches!(c, 'X' | 'x'))
    });
    match (len, well_formed) {
        (18, true) => Ok(keep_ends(id, mask, 6, 4)),
        (15, true) => Ok(keep_ends(id, mask, 6, 3)),
        (_, false) => Err(format!("id card number '{}' contains invalid characters", id)),
        (n, true) => Err(format!("id card number must have 15 or 18 digits, got {}", n)),
    }
}

fn mask_bank_card(value: &str, mask: &str, group: bool) -> Result<String, String> {
    let digits: String = value.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("bank card number '{}' contains invalid characters", value));
    }
    if !(12..=19).contains(&digits.len()) {
        return Err(format!(
            "bank card number must have 12 to 19 digits, got {}",
            digits.len()
        ));
    }
    let masked = keep_ends(&digits, mask, 6, 4);
    if !group {
        return Ok(masked);
    }
    let chars: Vec<char> = masked.chars().collect();
    Ok(chars
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" "))
}

fn mask_name(value: &str, mask: &str) -> String {
    let chars: Vec<char> = value.trim().chars().collect();
    match chars.len() {
        0 | 1 => chars.iter().collect(),
        2 => format!("{}{}", chars[0], mask),
        n => format!("{}{}{}", chars[0], mask.repeat(n - 2), chars[n - 1]),
    }
}

fn mask_email(value: &str, mask: &str, keep: usize) -> Result<String, String> {
    let Some((user, domain)) = value.rsplit_once('@') else {
        return Err(format!("'{}' is not an email address", value));
    };
    if user.is_empty() || domain.is_empty() {
        return Err(format!("'{}' is not an email address", value));
    }
    let chars: Vec<char> = user.chars().collect();
    let kept = keep.min(chars.len());
    let hidden = (chars.len() - kept).max(1);
    let mut out: String = chars[..kept].iter().collect();
    out.push_str(&mask.repeat(hidden));
    out.push('@');
    out.push_str(domain);
    Ok(out)
}
