//! Step registry, scenario world and the default step definitions.
//!
//! A pattern is plain text with `{string}` (a double-quoted argument) and
//! `{int}` placeholders. Patterns compile to anchored regexes; the first
//! registered match wins.

use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::flows;
use crate::label::normalize_quotes;
use crate::page_object::PageObject;
use crate::pages::{
    extract_inquiry_number, HomePage, ImmigrationRecordPage, LoginPage, MailboxSyncHomePage,
    MailboxSyncRecordPage, WebFormPage,
};
use crate::result::{ProbeError, ProbeResult};
use crate::session::Session;
use crate::test_data::{write_inquiry, TestDataReader};

/// Async step body
pub type StepHandler =
    Arc<dyn for<'a> Fn(&'a mut World, Vec<String>) -> BoxFuture<'a, ProbeResult<()>> + Send + Sync>;

const LIGHTNING_URL: &str = r"(?i)/lightning/.*";
const LIGHTNING_URL_TIMEOUT: Duration = Duration::from_secs(30);
const INITIATION_PERIOD_TIMEOUT: Duration = Duration::from_secs(10);

/// State shared by the steps of a run.
///
/// The session lives for the whole run; the page objects and the inquiry
/// number below are per scenario and cleared by [`World::reset_scenario`].
pub struct World {
    pub session: Session,
    pub data: TestDataReader,
    pub inquiry: Option<String>,
    pub proxy_home: Option<Arc<HomePage>>,
    pub mailbox: Option<Arc<MailboxSyncHomePage>>,
    pub record: Option<Arc<MailboxSyncRecordPage>>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("session", &self.session)
            .field("inquiry", &self.inquiry)
            .finish_non_exhaustive()
    }
}

impl World {
    /// World for a run; fixtures come from the configured test-data dir
    #[must_use]
    pub fn new(config: Config) -> Self {
        let data = TestDataReader::new(config.paths.test_data_dir.clone());
        Self {
            session: Session::new(config),
            data,
            inquiry: None,
            proxy_home: None,
            mailbox: None,
            record: None,
        }
    }

    /// Run configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        self.session.config()
    }

    /// Forget per-scenario page objects and values
    pub fn reset_scenario(&mut self) {
        self.inquiry = None;
        self.proxy_home = None;
        self.mailbox = None;
        self.record = None;
    }

    /// Cached page object on the active tab
    pub fn page<P: PageObject>(&mut self) -> ProbeResult<Arc<P>> {
        self.session.page_object::<P>()
    }
}

/// One registered step
#[derive(Clone)]
pub struct StepDefinition {
    pattern: String,
    regex: Regex,
    handler: StepHandler,
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl StepDefinition {
    /// Pattern as registered
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Compile a step pattern to an anchored regex
pub fn compile_pattern(pattern: &str) -> ProbeResult<Regex> {
    let mut source = String::from("^");
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        source.push_str(&regex::escape(&rest[..start]));
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{string}") {
            source.push_str("\"([^\"]*)\"");
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{int}") {
            source.push_str(r"(-?\d+)");
            rest = after;
        } else {
            source.push_str(&regex::escape("{"));
            rest = &tail[1..];
        }
    }
    source.push_str(&regex::escape(rest));
    source.push('$');
    Regex::new(&source).map_err(|e| ProbeError::Config {
        message: format!("bad step pattern '{pattern}': {e}"),
    })
}

/// Ordered step definitions
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    steps: Vec<StepDefinition>,
}

impl StepRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding [`register_defaults`]
    pub fn with_defaults() -> ProbeResult<Self> {
        let mut registry = Self::new();
        register_defaults(&mut registry)?;
        Ok(registry)
    }

    /// Register a step
    pub fn step<F>(&mut self, pattern: &str, handler: F) -> ProbeResult<&mut Self>
    where
        F: for<'a> Fn(&'a mut World, Vec<String>) -> BoxFuture<'a, ProbeResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let regex = compile_pattern(pattern)?;
        self.steps.push(StepDefinition {
            pattern: pattern.to_string(),
            regex,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    /// Number of definitions
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// First definition matching the step text, with its arguments.
    /// Typographic quotes in the text are normalized first.
    pub fn find(&self, text: &str) -> ProbeResult<(&StepDefinition, Vec<String>)> {
        let text = normalize_quotes(text.trim());
        self.steps
            .iter()
            .find_map(|def| {
                def.regex.captures(&text).map(|caps| {
                    let args = caps
                        .iter()
                        .skip(1)
                        .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                        .collect();
                    (def, args)
                })
            })
            .ok_or(ProbeError::UndefinedStep { text })
    }

    /// Find and run the step
    pub async fn run(&self, world: &mut World, text: &str) -> ProbeResult<()> {
        let (def, args) = self.find(text)?;
        tracing::debug!(pattern = %def.pattern, ?args, "running step");
        (def.handler)(world, args).await
    }
}

fn arg(args: &[String], index: usize) -> ProbeResult<&str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| ProbeError::page(format!("step argument {index} missing")))
}

/// Register the suite's step definitions
pub fn register_defaults(registry: &mut StepRegistry) -> ProbeResult<()> {
    registry
        .step("I am logged into Salesforce", |w, a| logged_in(w, a).boxed())?
        .step("I am on the Salesforce login page {string}", |w, a| on_login_page(w, a).boxed())?
        .step("I enter my User Name as {string} in the username field", |w, a| {
            enter_username(w, a).boxed()
        })?
        .step("I enter my Password as {string} in the password field", |w, a| {
            enter_password(w, a).boxed()
        })?
        .step("I click the {string} button", |w, a| click_button(w, a).boxed())?
        .step(
            "I should be successfully logged into the Salesforce Sandbox environment",
            |w, a| on_lightning(w, a).boxed(),
        )?
        .step("I should be see the Home tab in salesforce home page", |w, a| {
            home_tab_visible(w, a).boxed()
        })?
        .step("I open the IXT web form", |w, a| open_web_form(w, a).boxed())?
        .step("I select {string} from the {string} dropdown", |w, a| {
            select_dropdown(w, a).boxed()
        })?
        .step("I check the acknowledgment checkbox", |w, a| check_acknowledgment(w, a).boxed())?
        .step("I enter {string} in the {string} textbox", |w, a| enter_text(w, a).boxed())?
        .step("The form should be successfully submitted", |w, a| form_submitted(w, a).boxed())?
        .step("I do the proxy login to verify the case details", |w, a| {
            proxy_login(w, a).boxed()
        })?
        .step("I click the mailbox sync tab", |w, a| mailbox_tab(w, a).boxed())?
        .step("I switch to the {string} list view", |w, a| list_view(w, a).boxed())?
        .step("I open the respective IXT mailbox record", |w, a| open_record(w, a).boxed())?
        .step("I verify the {string} field contains {string}", |w, a| {
            field_contains(w, a).boxed()
        })?
        .step(
            "I verify the {string} field that should contain {string} under the Emails section",
            |w, a| email_status_contains(w, a).boxed(),
        )?
        .step("I open the first Immigration record", |w, a| open_first_immigration(w, a).boxed())?
        .step("I open the Immigration record {string}", |w, a| open_immigration(w, a).boxed())?
        .step("the CAP Nominee should be {string}", |w, a| cap_nominee_is(w, a).boxed())?
        .step("the Initiation Period field should be visible", |w, a| {
            initiation_period_visible(w, a).boxed()
        })?;
    Ok(())
}

async fn logged_in(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    flows::login_to_salesforce(&mut world.session).await?;
    Ok(())
}

/// The login URL comes from the run configuration; the quoted URL in the
/// step is documentation only.
async fn on_login_page(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    let url = world.config().base_url.clone();
    tracing::debug!(written = arg(&args, 0)?, configured = %url, "opening login page");
    let login = world.page::<LoginPage>()?;
    login.open(&url).await?;
    if !login.is_ready().await? {
        return Err(ProbeError::assertion("login page is not ready"));
    }
    Ok(())
}

/// Credentials always come from the configuration, never the feature file
async fn enter_username(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    let username = world.config().username.clone();
    world.page::<LoginPage>()?.enter_username(&username).await
}

async fn enter_password(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    let password = world.config().password.clone();
    world.page::<LoginPage>()?.enter_password(&password).await
}

async fn click_button(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    let label = arg(&args, 0)?;
    let login = label.replace(' ', "");
    if login.eq_ignore_ascii_case("login") {
        world.page::<LoginPage>()?.submit().await
    } else {
        world.page::<WebFormPage>()?.click_button(label).await
    }
}

async fn on_lightning(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    let pattern = Regex::new(LIGHTNING_URL).map_err(|e| ProbeError::page(e.to_string()))?;
    let url = world
        .session
        .page()?
        .wait_for_url(&pattern, LIGHTNING_URL_TIMEOUT)
        .await?;
    tracing::info!(url = %url, "on Lightning");
    Ok(())
}

async fn home_tab_visible(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    let timeout = world.session.page()?.default_timeout();
    if world.page::<HomePage>()?.is_home_tab_visible(timeout).await {
        Ok(())
    } else {
        Err(ProbeError::assertion("Home tab is not visible"))
    }
}

async fn open_web_form(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    flows::go_to_web_form(&mut world.session).await?;
    Ok(())
}

async fn select_dropdown(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    let option = arg(&args, 0)?;
    let label = arg(&args, 1)?;
    world.page::<WebFormPage>()?.select_dropdown(label, option).await
}

async fn check_acknowledgment(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    world.page::<WebFormPage>()?.check_acknowledgment().await
}

/// Every textbox on the form is the inquiry rich text area
async fn enter_text(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    let text = arg(&args, 0)?;
    tracing::debug!(textbox = arg(&args, 1)?, "entering text");
    world.page::<WebFormPage>()?.enter_inquiry(text).await
}

async fn form_submitted(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    let form = world.page::<WebFormPage>()?;
    let message = form.success_message().await?;
    let inquiry = extract_inquiry_number(&message).ok_or_else(|| {
        ProbeError::assertion(format!("No IXT number found in the message: {message}"))
    })?;
    write_inquiry(&world.config().paths.inquiry_file(), &inquiry)?;
    tracing::info!(inquiry = %inquiry, "reference number saved");
    world.inquiry = Some(inquiry);
    form.go_back_to_salesforce().await
}

async fn proxy_login(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    let home = flows::proxy_login(&mut world.session, &world.data).await?;
    world.proxy_home = Some(home);
    Ok(())
}

async fn mailbox_tab(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    let home = match world.proxy_home.clone() {
        Some(home) => home,
        None => world.page::<HomePage>()?,
    };
    home.open_mailbox_sync_tab().await?;
    world.mailbox = Some(world.page::<MailboxSyncHomePage>()?);
    Ok(())
}

async fn list_view(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    let name = arg(&args, 0)?;
    let mailbox = world.page::<MailboxSyncHomePage>()?;
    mailbox.go_to_list_view(name).await?;
    let timeout = world.session.page()?.default_timeout();
    if mailbox.is_list_view_loaded(name, timeout).await {
        Ok(())
    } else {
        Err(ProbeError::assertion(format!("list view '{name}' did not load")))
    }
}

async fn open_record(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    if world.mailbox.is_none() {
        return Err(ProbeError::precondition("Mailbox home page not available"));
    }
    let (inquiry, record) = flows::open_saved_inquiry(&mut world.session).await?;
    world.inquiry = Some(inquiry);
    world.record = Some(record);
    Ok(())
}

fn current_record(world: &mut World) -> ProbeResult<Arc<MailboxSyncRecordPage>> {
    match world.record.clone() {
        Some(record) => Ok(record),
        None => world.page::<MailboxSyncRecordPage>(),
    }
}

async fn field_contains(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    let field = arg(&args, 0)?;
    let expected = arg(&args, 1)?;
    let actual = current_record(world)?.field_value(field).await?;
    if actual.contains(expected) {
        tracing::info!(field, actual = %actual, "field contains expected value");
        Ok(())
    } else {
        Err(ProbeError::assertion(format!(
            "{field} did not contain expected value: expected '{expected}' in '{actual}'"
        )))
    }
}

async fn email_status_contains(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    let field = arg(&args, 0)?;
    let expected = arg(&args, 1)?;
    if field != "Email Status" {
        return Err(ProbeError::assertion(format!(
            "only Email Status can be checked under the Emails section, not '{field}'"
        )));
    }
    let status = current_record(world)?.email_status().await?;
    if status.contains(expected) {
        tracing::info!(field, status = %status, "email status matches");
        Ok(())
    } else {
        Err(ProbeError::assertion(format!(
            "{field} is '{status}', expected it to contain '{expected}'"
        )))
    }
}

async fn open_first_immigration(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    flows::open_immigration_record(&mut world.session, None).await?;
    Ok(())
}

async fn open_immigration(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    flows::open_immigration_record(&mut world.session, Some(arg(&args, 0)?)).await?;
    Ok(())
}

async fn cap_nominee_is(world: &mut World, args: Vec<String>) -> ProbeResult<()> {
    let expected = arg(&args, 0)?;
    let timeout = world.session.page()?.default_timeout();
    let actual = world.page::<ImmigrationRecordPage>()?.cap_nominee_value(timeout).await?;
    if actual == expected {
        Ok(())
    } else {
        Err(ProbeError::assertion(format!(
            "CAP Nominee is '{actual}', expected '{expected}'"
        )))
    }
}

async fn initiation_period_visible(world: &mut World, _args: Vec<String>) -> ProbeResult<()> {
    let record = world.page::<ImmigrationRecordPage>()?;
    if record.is_initiation_period_visible(INITIATION_PERIOD_TIMEOUT).await {
        Ok(())
    } else {
        Err(ProbeError::assertion("Initiation Period (CI) is not visible"))
    }
}
