//! Authenticated browser session lifecycle.
//!
//! A [`SessionManager`] owns at most one logged-in page. It negotiates a new
//! one on demand, never starts two negotiations within the configured
//! cooldown, and gives up after `max_retry` consecutive failures.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::security::Credentials;
use crate::traits::browser::{BrowserLauncher, Key, PageClient};
use crate::types::config::CrawlerConfig;

/// A logged-in page plus its validity flag.
pub struct Session<P> {
    page: P,
    valid: bool,
    checked_at: Instant,
}

impl<P> Session<P> {
    /// Borrow the page.
    pub fn page(&self) -> &P {
        &self.page
    }

    /// Whether the platform still treats this page as logged in.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// When the session was last confirmed usable.
    pub fn checked_at(&self) -> Instant {
        self.checked_at
    }
}

/// Negotiates and hands out the authenticated page.
pub struct SessionManager<L: BrowserLauncher> {
    launcher: L,
    credentials: Credentials,
    config: CrawlerConfig,
    session: Option<Session<L::Page>>,
    last_attempt: Option<Instant>,
    failures: u32,
    negotiations: usize,
}

impl<L: BrowserLauncher> SessionManager<L> {
    pub fn new(launcher: L, credentials: Credentials, config: CrawlerConfig) -> Self {
        Self {
            launcher,
            credentials,
            config,
            session: None,
            last_attempt: None,
            failures: 0,
            negotiations: 0,
        }
    }

    /// Return a logged-in page, negotiating one if needed.
    ///
    /// Fails with [`SessionError::NotYetUsable`] when the previous attempt
    /// started less than `session_cooldown` ago, and with
    /// [`SessionError::RetryBudgetExhausted`] once `max_retry` attempts in a
    /// row have failed.
    pub async fn ensure_session(&mut self) -> SessionResult<&L::Page> {
        if !self.is_valid() {
            self.check_budget()?;
            self.check_cooldown()?;
            self.negotiate().await?;
        }

        match &self.session {
            Some(session) => Ok(&session.page),
            None => Err(SessionError::NotYetUsable {
                retry_in: self.config.session_cooldown,
            }),
        }
    }

    /// Whether a valid session is currently held.
    pub fn is_valid(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.valid)
    }

    /// Current session, valid or not.
    pub fn session(&self) -> Option<&Session<L::Page>> {
        self.session.as_ref()
    }

    /// Number of negotiations started so far.
    pub fn negotiation_count(&self) -> usize {
        self.negotiations
    }

    /// Consecutive failed negotiations.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Mark the held session unusable. The next `ensure_session` renegotiates.
    pub fn invalidate(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.valid {
                info!("Session invalidated");
            }
            session.valid = false;
        }
    }

    /// Close the held page, if any.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.page.close().await {
                warn!(error = %e, "Failed to close session page");
            }
        }
    }

    fn check_budget(&self) -> SessionResult<()> {
        let budget = self.config.max_retry.max(1);
        if self.failures >= budget {
            return Err(SessionError::RetryBudgetExhausted {
                attempts: self.failures,
            });
        }
        Ok(())
    }

    fn check_cooldown(&self) -> SessionResult<()> {
        if let Some(last) = self.last_attempt {
            let elapsed = Instant::now().saturating_duration_since(last);
            if elapsed < self.config.session_cooldown {
                let retry_in = self.config.session_cooldown - elapsed;
                debug!(?retry_in, "Session negotiation cooling down");
                return Err(SessionError::NotYetUsable { retry_in });
            }
        }
        Ok(())
    }

    async fn negotiate(&mut self) -> SessionResult<()> {
        // Stamped before anything can fail so a failing login still waits out the cooldown.
        self.last_attempt = Some(Instant::now());
        self.negotiations += 1;
        self.close().await;

        info!(attempt = self.failures + 1, "Negotiating session");
        let page = match self.launcher.launch().await {
            Ok(page) => page,
            Err(e) => {
                self.failures += 1;
                warn!(error = %e, failures = self.failures, "Browser launch failed");
                return Err(e.into());
            }
        };

        if let Err(e) = login(&page, &self.credentials, &self.config).await {
            self.failures += 1;
            warn!(error = %e, failures = self.failures, "Login failed");
            if let Err(close_err) = page.close().await {
                debug!(error = %close_err, "Failed to close page after login failure");
            }
            return Err(e);
        }

        self.failures = 0;
        self.session = Some(Session {
            page,
            valid: true,
            checked_at: Instant::now(),
        });
        info!("Session established");
        Ok(())
    }
}

async fn require<P: PageClient>(page: &P, selector: &str, config: &CrawlerConfig) -> SessionResult<()> {
    if page.wait_for_selector(selector, config.element_wait).await? {
        Ok(())
    } else {
        Err(SessionError::MissingElement {
            selector: selector.to_string(),
        })
    }
}

/// Walk the platform's login form.
async fn login<P: PageClient>(
    page: &P,
    credentials: &Credentials,
    config: &CrawlerConfig,
) -> SessionResult<()> {
    let platform = &config.platform;

    page.set_viewport(config.viewport_width, config.login_viewport_height)
        .await?;

    debug!("Step: open home page");
    page.navigate(&platform.home_url).await?;

    debug!("Step: open login page");
    page.navigate(&platform.login_url).await?;

    debug!("Step: fill username");
    require(page, &platform.username_selector, config).await?;
    page.type_text(&platform.username_selector, &credentials.username)
        .await?;
    page.press_key(Key::Enter).await?;

    // Some accounts get asked to confirm the handle before the password prompt.
    if page
        .wait_for_selector(&platform.confirm_selector, config.confirm_wait)
        .await?
    {
        debug!("Step: answer confirmation challenge");
        page.type_text(&platform.confirm_selector, &credentials.username)
            .await?;
        page.press_key(Key::Enter).await?;
    }

    debug!("Step: fill password");
    require(page, &platform.password_selector, config).await?;
    page.type_text(&platform.password_selector, credentials.password.expose())
        .await?;
    page.press_key(Key::Enter).await?;

    page.wait_until_stable(config.login_settle).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowser, MockPage};
    use std::time::Duration;

    fn config() -> CrawlerConfig {
        CrawlerConfig::default().without_settle_delays()
    }

    fn manager(browser: MockBrowser) -> SessionManager<MockBrowser> {
        SessionManager::new(browser, Credentials::new("alice", "hunter2"), config())
    }

    #[tokio::test(start_paused = true)]
    async fn test_negotiates_once_and_reuses() {
        let browser = MockBrowser::new();
        let mut sessions = manager(browser.clone());

        sessions.ensure_session().await.unwrap();
        sessions.ensure_session().await.unwrap();

        assert_eq!(browser.launch_count(), 1);
        assert_eq!(sessions.negotiation_count(), 1);
        assert!(sessions.is_valid());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_types_credentials() {
        let browser = MockBrowser::new();
        let mut sessions = manager(browser.clone());

        sessions.ensure_session().await.unwrap();

        let typed = browser.typed();
        assert!(typed.iter().any(|(_, text)| text == "alice"));
        assert!(typed.iter().any(|(_, text)| text == "hunter2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_challenge_is_answered() {
        let browser = MockBrowser::new().with_confirm_challenge();
        let mut sessions = manager(browser.clone());

        sessions.ensure_session().await.unwrap();

        let confirm = CrawlerConfig::default().platform.confirm_selector;
        assert!(browser
            .typed()
            .iter()
            .any(|(selector, text)| selector == &confirm && text == "alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_blocks_second_attempt() {
        let browser = MockBrowser::new().without_login_form();
        let mut sessions = manager(browser.clone());

        let first = sessions.ensure_session().await;
        assert!(matches!(first, Err(SessionError::MissingElement { .. })));

        tokio::time::advance(Duration::from_secs(10)).await;
        match sessions.ensure_session().await {
            Err(SessionError::NotYetUsable { retry_in }) => {
                assert!(retry_in <= Duration::from_secs(50));
                assert!(retry_in > Duration::from_secs(49));
            }
            other => panic!("expected NotYetUsable, got {:?}", other.map(|_| ())),
        }
        assert_eq!(browser.launch_count(), 1);

        tokio::time::advance(Duration::from_secs(51)).await;
        let third = sessions.ensure_session().await;
        assert!(matches!(third, Err(SessionError::MissingElement { .. })));
        assert_eq!(browser.launch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausts() {
        let browser = MockBrowser::new().without_login_form();
        let mut sessions = SessionManager::new(
            browser.clone(),
            Credentials::new("alice", "hunter2"),
            config().with_max_retry(2),
        );

        for _ in 0..2 {
            assert!(sessions.ensure_session().await.is_err());
            tokio::time::advance(Duration::from_secs(61)).await;
        }

        let err = sessions.ensure_session().await.map(|_| ()).unwrap_err();
        assert!(matches!(err, SessionError::RetryBudgetExhausted { attempts: 2 }));
        assert!(!err.is_recoverable());
        assert_eq!(browser.launch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_renegotiation_after_cooldown() {
        let browser = MockBrowser::new();
        let mut sessions = manager(browser.clone());

        sessions.ensure_session().await.unwrap();
        sessions.invalidate();
        assert!(!sessions.is_valid());

        assert!(matches!(
            sessions.ensure_session().await.map(|_| ()),
            Err(SessionError::NotYetUsable { .. })
        ));

        tokio::time::advance(Duration::from_secs(60)).await;
        sessions.ensure_session().await.unwrap();
        assert_eq!(browser.launch_count(), 2);
        assert_eq!(browser.closed_count(), 1);
    }

    #[tokio::test]
    async fn test_page_accessor() {
        let page = MockPage::default();
        let session = Session {
            page,
            valid: true,
            checked_at: Instant::now(),
        };
        assert!(session.is_valid());
        assert!(session.checked_at() <= Instant::now());
        let _ = session.page();
    }
}
