use scraper::{Html, Selector};
use url::form_urlencoded;
use url::Url;

use crate::fetch::{Credentials, Page};
use crate::site::LoginForm;
use crate::{FailureKind, FetchError};

/// A filled-in login form ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub action: Url,
    pub body: String,
}

impl LoginRequest {
    /// Reads the login form on `page`, keeps its hidden fields and fills in the credentials.
    pub fn from_page(
        page: &Page,
        form: &LoginForm,
        credentials: &Credentials,
    ) -> Result<Self, FetchError> {
        let document = Html::parse_document(&page.html);
        let form_sel = Selector::parse(&form.form_selector)
            .map_err(|_| FetchError::new(FailureKind::LoginForm, form.form_selector.clone()))?;
        let input_sel = Selector::parse("input[name]")
            .map_err(|_| FetchError::new(FailureKind::LoginForm, "input[name]"))?;

        let form_el = document.select(&form_sel).next().ok_or_else(|| {
            FetchError::new(
                FailureKind::LoginForm,
                format!("{} not found on {}", form.form_selector, page.url),
            )
        })?;

        let action = match form_el.value().attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => page
                .url
                .join(action)
                .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?,
            _ => page.url.clone(),
        };

        let mut fields: Vec<(String, String)> = form_el
            .select(&input_sel)
            .filter(|input| {
                let kind = input.value().attr("type").unwrap_or("text");
                let toggles = kind.eq_ignore_ascii_case("checkbox") || kind.eq_ignore_ascii_case("radio");
                !toggles || input.value().attr("checked").is_some()
            })
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or_default();
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        set_field(&mut fields, &form.email_field, &credentials.email);
        set_field(&mut fields, &form.password_field, &credentials.password);

        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter())
            .finish();

        Ok(Self { action, body })
    }
}

fn set_field(fields: &mut Vec<(String, String)>, name: &str, value: &str) {
    match fields.iter_mut().find(|(field, _)| field == name) {
        Some((_, existing)) => *existing = value.to_string(),
        None => fields.push((name.to_string(), value.to_string())),
    }
}

/// The site echoes the account e-mail on the page after a successful login.
pub fn login_succeeded(html: &str, credentials: &Credentials) -> bool {
    html.contains(&credentials.email)
}
