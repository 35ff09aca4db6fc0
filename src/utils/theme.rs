use colored::Colorize;

pub struct Theme {
    pub prompt: String,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub warning_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt: "xish> ".bright_cyan().to_string(),
            error_style: Box::new(|s| s.bright_red().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
        }
    }
}

impl Theme {
    pub fn load_theme(theme_name: &str) -> Theme {
        match theme_name {
            "plain" => Theme {
                prompt: "xish> ".to_string(),
                error_style: Box::new(|s| s),
                warning_style: Box::new(|s| s),
            },
            _ => Theme::default(),
        }
    }
}
