//! End-to-end scenario runs against scripted pages

#![allow(clippy::unwrap_used, clippy::expect_used)]

use futures::future::FutureExt;
use lightning_probe::dom::{DomNode, FrameSnapshot};
use lightning_probe::feature::parse;
use lightning_probe::test_data::{read_inquiry, write_inquiry};
use lightning_probe::{
    Config, MockElement, MockLauncher, MockPage, PageDriver, ProbeError, ScenarioRunner,
    ScenarioStatus, Selector, StepRegistry,
};
use std::sync::Arc;
use std::time::Duration;

const HOME_URL: &str = "https://acme.lightning.force.com/lightning/page/home";
const RECORD_URL: &str = "https://acme.lightning.force.com/lightning/r/Mailbox_Sync__c/a01/view";

fn config(root: &std::path::Path) -> Config {
    Config::default()
        .with_root(root)
        .with_base_url("https://acme.my.salesforce.com")
        .with_credentials("qa@acme.com", "s3cret")
        .with_field_timeout(Duration::from_secs(2))
}

fn login_page() -> MockPage {
    MockPage::new()
        .with_element("#username", MockElement::visible())
        .with_element("#password", MockElement::visible())
        .with_element("#Login", MockElement::visible())
        .with_element("a[title='Home']", MockElement::visible())
        .with_click_target("#Login", HOME_URL)
}

fn layout_item(label: &str, value: &str) -> DomNode {
    DomNode::new("records-record-layout-item")
        .attr("data-label", label)
        .child(DomNode::new("lightning-formatted-text").text(value))
}

fn record_page() -> MockPage {
    let body = DomNode::new("body").children(vec![
        layout_item("Record Type", "Inquiry"),
        layout_item("Status", "Open"),
    ]);
    MockPage::new()
        .with_url(RECORD_URL)
        .with_frames(vec![FrameSnapshot::new(RECORD_URL, body)])
}

const LOGIN_FEATURE: &str = r#"
@login
Feature: Salesforce login

  Scenario: Valid login
    Given I am on the Salesforce login page "https://login.salesforce.com"
    When I enter my User Name as "someone-else" in the username field
    And I enter my Password as "wrong" in the password field
    And I click the "Log In" button
    Then I should be successfully logged into the Salesforce Sandbox environment
    And I should be see the Home tab in salesforce home page
"#;

#[tokio::test(start_paused = true)]
async fn test_login_scenario_uses_configured_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(login_page());
    let launcher = Arc::new(MockLauncher::with_page(page.clone()));
    let mut runner = ScenarioRunner::new(
        config(dir.path()),
        StepRegistry::with_defaults().unwrap(),
        launcher.clone(),
    );

    let report = runner.run(&[parse(LOGIN_FEATURE).unwrap()]).await.unwrap();

    assert_eq!(report.results[0].status, ScenarioStatus::Passed, "{:?}", report.results[0].error);
    assert!(page.was_called("goto:https://acme.my.salesforce.com"));
    assert_eq!(page.value_of(&Selector::css("#username")).as_deref(), Some("qa@acme.com"));
    assert_eq!(page.value_of(&Selector::css("#password")).as_deref(), Some("s3cret"));
    assert_eq!(page.current_url().await.unwrap(), HOME_URL);
    assert_eq!(launcher.launches(), 1);
    assert!(dir.path().join("reports").join("report.json").is_file());
}

const RECORD_FEATURE: &str = r#"
Feature: Mailbox record

  Scenario: Record type
    Then I verify the "Record Type" field contains "Inquiry"

  Scenario: Status closed
    Then I verify the "Status" field contains "Closed"

  Scenario: Status open
    Then I verify the "Status" field contains "Open"
"#;

#[tokio::test(start_paused = true)]
async fn test_record_fields_are_read_by_label() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(MockLauncher::with_page(Arc::new(record_page())));
    let mut runner = ScenarioRunner::new(
        config(dir.path()),
        StepRegistry::with_defaults().unwrap(),
        launcher,
    );

    let report = runner.run(&[parse(RECORD_FEATURE).unwrap()]).await.unwrap();

    let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [ScenarioStatus::Passed, ScenarioStatus::Failed, ScenarioStatus::Passed]
    );
    let failed = &report.results[1];
    let error = failed.error.as_deref().unwrap();
    assert!(error.contains("expected 'Closed' in 'Open'"), "{error}");
    assert!(failed.screenshot.as_ref().unwrap().is_file());
}

#[tokio::test]
async fn test_custom_steps_extend_the_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = StepRegistry::with_defaults().unwrap();
    let defaults = registry.len();
    registry
        .step("I note inquiry {string}", |world, args| {
            async move {
                let path = world.config().paths.inquiry_file();
                write_inquiry(&path, &args[0])?;
                world.inquiry = Some(args[0].clone());
                Ok::<_, ProbeError>(())
            }
            .boxed()
        })
        .unwrap();
    assert_eq!(registry.len(), defaults + 1);

    let feature =
        parse("Feature: Hand-off\n  Scenario: note\n    Given I note inquiry \"IXT-20417\"\n")
            .unwrap();
    let config = config(dir.path());
    let inquiry_file = config.paths.inquiry_file();
    let mut runner = ScenarioRunner::new(config, registry, Arc::new(MockLauncher::new()));

    let report = runner.run(&[feature]).await.unwrap();

    assert!(report.all_passed());
    assert_eq!(read_inquiry(&inquiry_file).unwrap(), "IXT-20417");
}
