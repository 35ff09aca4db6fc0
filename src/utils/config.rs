use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    /// 0 = 静默，1 = 回显命令，2 = 管道和展开过程，3 = 全部
    pub verbosity: u8,
    pub logger_dir: Option<PathBuf>,
    pub max_tokens: usize,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/xish")
        } else {
            PathBuf::from("tmp")
        }
    }

    pub fn new() -> Self {
        // 优先加载 .env
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(theme) = env::var("XISH_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("XISH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("XISH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Some(verbosity) = env::var("XISH_VERBOSITY")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.verbosity = verbosity;
        }

        if let Ok(dir) = env::var("XISH_LOG_DIR") {
            if !dir.is_empty() {
                config.logger_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(max) = env::var("XISH_MAX_TOKENS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .filter(|max| *max > 0)
        {
            config.max_tokens = max;
        }

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "emacs" => EditMode::Emacs,
            _ => EditMode::Vi,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("xish"),
            theme: String::from("default"),
            history_file: config_dir.join(".xish_history"),
            editor_mode: String::from("vi"),
            verbosity: 0,
            logger_dir: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}
