use minijinja::{context, Environment};
use once_cell::sync::Lazy;

const LOGIN_TEMPLATE_NAME: &str = "login.html";

static TEMPLATES: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.add_template(LOGIN_TEMPLATE_NAME, include_str!("login.html"))
        .unwrap_or_else(|err| panic!("failed to compile login template: {err}"));
    env
});

pub fn render_login_page() -> Result<String, minijinja::Error> {
    TEMPLATES.get_template(LOGIN_TEMPLATE_NAME)?.render(context! {
        title => "Device Login",
        action => "/validate_user",
    })
}
