//! 日志脱敏
//! 地址、邮箱、哈希只输出首尾片段；私钥、口令、原像不进入日志

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if !address.is_ascii() || address.len() < 10 {
        return "*".repeat(address.chars().count());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏email
pub fn redact_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let local = &email[..at_pos];
        let domain = &email[at_pos..];

        match local.chars().next() {
            Some(first) if local.chars().count() > 2 => format!("{}***{}", first, domain),
            _ => format!("**{}", domain),
        }
    } else {
        "***@***".to_string()
    }
}
