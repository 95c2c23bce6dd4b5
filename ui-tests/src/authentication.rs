use anyhow::{Result, ensure};
use tracing::info;

use crate::framework::TestEnvironment;
use crate::pages::dashboard::{self, DashboardPage};

/// Login check: an authenticated session lands on the dashboard.
///
/// The session itself comes from the configured session cookie, this test
/// only proves that it is accepted.
///
/// Steps:
/// - Navigate to /dashboard/
/// - Verify the browser stayed on /dashboard/ instead of being sent to a
///   login page
/// - Verify at least one market actor card rendered
#[tokio::test]
#[ignore = "requires TARGET_URL and a WebDriver"]
async fn test_login_lands_on_dashboard() -> Result<()> {
    let env = TestEnvironment::setup().await?;
    let outcome = login_lands_on_dashboard(&env).await;
    env.finish(
        concat!(module_path!(), "::test_login_lands_on_dashboard"),
        outcome,
    )
    .await
}

async fn login_lands_on_dashboard(env: &TestEnvironment) -> Result<()> {
    info!("🔐 Opening the dashboard with the configured session");
    let page = DashboardPage::open(env).await?;

    let current_url = env.current_url().await?;
    ensure!(
        current_url.ends_with(dashboard::PATH),
        "Should be on the dashboard. Current URL: {}",
        current_url
    );

    let card = page.first_card().await?;
    info!("✅ Logged in, first market actor card is {:?}", card.name);
    Ok(())
}
