use crate::shell::error::{Result, ShellError};

/// 把一行输入切分成 token（支持引号），`#` 开头的 token 及其后内容视为注释
pub fn tokenize(line: &str, max_tokens: usize) -> Result<Vec<String>> {
    let mut tokens =
        shell_words::split(line).map_err(|e| ShellError::Syntax(e.to_string()))?;

    if let Some(comment) = tokens.iter().position(|t| t.starts_with('#')) {
        tokens.truncate(comment);
    }
    if tokens.len() > max_tokens {
        return Err(ShellError::Syntax(format!(
            "too many tokens ({} > {})",
            tokens.len(),
            max_tokens
        )));
    }
    Ok(tokens)
}
