//! Server-rendered HTML pages and htmx fragments.
//!
//! Templates are compiled into the binary and loaded once at startup.

use axum::response::Html;
use minijinja::{AutoEscape, Environment};
use serde::Serialize;

use crate::error::AppResult;

pub const GENERATE_PAGE: &str = "generate.html";
pub const LIBRARY_PAGE: &str = "library.html";
pub const PROGRESS_FRAGMENT: &str = "partials/progress.html";
pub const RESULT_FRAGMENT: &str = "partials/result.html";
pub const ERROR_FRAGMENT: &str = "partials/error.html";

const SOURCES: [(&str, &str); 6] = [
    ("base.html", include_str!("../templates/base.html")),
    (GENERATE_PAGE, include_str!("../templates/generate.html")),
    (LIBRARY_PAGE, include_str!("../templates/library.html")),
    (PROGRESS_FRAGMENT, include_str!("../templates/partials/progress.html")),
    (RESULT_FRAGMENT, include_str!("../templates/partials/result.html")),
    (ERROR_FRAGMENT, include_str!("../templates/partials/error.html")),
];

/// The compiled template set.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Compile every template. Fails on a syntax error.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        for (name, source) in SOURCES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Render `name` with `context` into an HTML response body.
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> AppResult<Html<String>> {
        let template = self.env.get_template(name)?;
        Ok(Html(template.render(context)?))
    }

    /// Render the error fragment with `message`.
    pub fn error_fragment(&self, message: &str) -> AppResult<Html<String>> {
        self.render(ERROR_FRAGMENT, minijinja::context! { message })
    }
}
