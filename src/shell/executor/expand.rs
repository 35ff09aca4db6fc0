use glob::{glob_with, MatchOptions};
use log::debug;

use super::variable::VariableStore;

const GLOB_CHARS: &[char] = &['*', '?', '['];

/// 对一行 token 做 `${name}` 变量替换和文件名通配展开
pub struct Expander<'a> {
    variables: &'a VariableStore,
    max_tokens: usize,
}

impl<'a> Expander<'a> {
    pub fn new(variables: &'a VariableStore, max_tokens: usize) -> Self {
        Self {
            variables,
            max_tokens,
        }
    }

    pub fn substitute(&self, tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .map(|token| self.substitute_token(token))
            .collect()
    }

    /// 未定义的变量替换为空字符串；没有匹配 `}` 的 `${` 及其后的内容原样保留。
    /// 替换进来的值不会再被扫描。
    fn substitute_token(&self, token: &str) -> String {
        let mut result = String::with_capacity(token.len());
        let mut rest = token;

        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let Some(len) = after.find('}') else {
                debug!("未闭合的变量引用: {}", token);
                break;
            };
            result.push_str(&rest[..start]);
            result.push_str(self.variables.get(&after[..len]).unwrap_or_default());
            rest = &after[len + 1..];
        }
        result.push_str(rest);
        result
    }

    /// 命令名只取第一个匹配；其余参数展开为全部匹配。没有匹配时保留原样。
    /// 结果最多 `max_tokens` 个，超出部分被丢弃。
    pub fn glob_expand(&self, tokens: &[String]) -> Vec<String> {
        let mut expanded = Vec::with_capacity(tokens.len());

        for (index, token) in tokens.iter().enumerate() {
            let mut matches = glob_matches(token);
            if matches.is_empty() {
                matches.push(token.clone());
            }
            if index == 0 && matches.len() > 1 {
                debug!("命令名 {} 有 {} 个匹配，只使用 {}", token, matches.len(), matches[0]);
                matches.truncate(1);
            }

            for path in matches {
                if expanded.len() >= self.max_tokens {
                    debug!("展开结果超过 {} 个 token，其余部分被丢弃", self.max_tokens);
                    return expanded;
                }
                expanded.push(path);
            }
        }
        expanded
    }
}

fn glob_matches(pattern: &str) -> Vec<String> {
    if !pattern.contains(GLOB_CHARS) {
        return Vec::new();
    }

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    match glob_with(pattern, options) {
        Ok(paths) => paths
            .flatten()
            .map(|path| path.to_string_lossy().into_owned())
            .collect(),
        Err(e) => {
            debug!("无效的通配模式 {}: {}", pattern, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs::File;

    use tempfile::TempDir;

    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn store(pairs: &[(&str, &str)]) -> VariableStore {
        let mut vars = VariableStore::new();
        for (name, value) in pairs {
            vars.set(*name, *value).unwrap();
        }
        vars
    }

    fn fixture(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in files {
            File::create(dir.path().join(name)).unwrap();
        }
        dir
    }

    fn in_dir(dir: &TempDir, pattern: &str) -> String {
        format!("{}/{}", dir.path().display(), pattern)
    }

    #[test]
    fn substitution_without_references_is_identity() {
        let vars = store(&[("X", "3")]);
        let line = tokens(&["echo", "$X", "{X}", "plain", "a$", "}{"]);
        assert_eq!(Expander::new(&vars, 64).substitute(&line), line);
    }

    #[test]
    fn substitutes_every_occurrence() {
        let vars = store(&[("X", "3"), ("NAME", "world")]);
        let line = tokens(&["${X}", "${X}-${X}", "hello_${NAME}!", "${X}${NAME}"]);
        assert_eq!(
            Expander::new(&vars, 64).substitute(&line),
            tokens(&["3", "3-3", "hello_world!", "3world"])
        );
    }

    #[test]
    fn undefined_variables_become_empty() {
        let vars = VariableStore::new();
        let line = tokens(&["a${MISSING}b", "${MISSING}"]);
        assert_eq!(
            Expander::new(&vars, 64).substitute(&line),
            tokens(&["ab", ""])
        );
    }

    #[test]
    fn unterminated_reference_is_kept_literally() {
        let vars = store(&[("X", "3")]);
        let line = tokens(&["${X", "pre${X}post${X", "${"]);
        assert_eq!(
            Expander::new(&vars, 64).substitute(&line),
            tokens(&["${X", "pre3post${X", "${"])
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let vars = store(&[("SELF", "${SELF}")]);
        let line = tokens(&["${SELF}"]);
        assert_eq!(
            Expander::new(&vars, 64).substitute(&line),
            tokens(&["${SELF}"])
        );
    }

    #[test]
    fn arguments_expand_to_every_sorted_match() {
        let dir = fixture(&["b.txt", "a.txt", "c.log", ".hidden.txt"]);
        let vars = VariableStore::new();
        let line = tokens(&["ls", in_dir(&dir, "*.txt").as_str(), "-l"]);

        assert_eq!(
            Expander::new(&vars, 64).glob_expand(&line),
            vec![
                "ls".to_string(),
                in_dir(&dir, "a.txt"),
                in_dir(&dir, "b.txt"),
                "-l".to_string(),
            ]
        );
    }

    #[test]
    fn unmatched_pattern_passes_through() {
        let dir = fixture(&["a.txt"]);
        let vars = VariableStore::new();
        let line = tokens(&["echo", in_dir(&dir, "*.rs").as_str(), "[unclosed"]);
        assert_eq!(Expander::new(&vars, 64).glob_expand(&line), line);
    }

    #[test]
    fn command_name_keeps_first_match_only() {
        let dir = fixture(&["tool-a", "tool-b"]);
        let vars = VariableStore::new();
        let line = tokens(&[in_dir(&dir, "tool-*").as_str(), in_dir(&dir, "tool-*").as_str()]);

        assert_eq!(
            Expander::new(&vars, 64).glob_expand(&line),
            vec![
                in_dir(&dir, "tool-a"),
                in_dir(&dir, "tool-a"),
                in_dir(&dir, "tool-b"),
            ]
        );
    }

    #[test]
    fn expansion_is_capped_at_max_tokens() {
        let dir = fixture(&["1", "2", "3", "4", "5"]);
        let vars = VariableStore::new();
        let line = tokens(&["echo", in_dir(&dir, "*").as_str(), "tail"]);

        let expanded = Expander::new(&vars, 3).glob_expand(&line);
        assert_eq!(
            expanded,
            vec!["echo".to_string(), in_dir(&dir, "1"), in_dir(&dir, "2")]
        );
    }
}
