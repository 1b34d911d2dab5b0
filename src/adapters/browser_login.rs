use std::time::Duration;

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions};
use thiserror::Error;

/// Diagnostic screenshots; written on every run, consumed by nobody.
pub const LOGIN_SCREENSHOT_PATH: &str = "screenshot.png";
pub const CONFIRMATION_SCREENSHOT_PATH: &str = "after-message.png";

const SUBMIT_WAIT: Duration = Duration::from_secs(5);
const CONFIRMATION_WAIT: Duration = Duration::from_secs(10);

const SUBMIT_BUTTON: &str = r#"//button[contains(., "Submit")]"#;
const LOGIN_ID_FIELD: &str = "input#loginId";
const PASSWORD_FIELD: &str = r#"input[name="password"]"#;
const SIGN_IN_BUTTON: &str = r#"//button[contains(@class, "c-btn--primary")][contains(., "Sign in")]"#;
const CONFIRMATION_ELEMENT: &str = ".text-center.message-screen.b-bubble-screen__spaced";

#[derive(Debug, Error)]
pub enum BrowserLoginError {
    #[error("browser automation failed: {0}")]
    Automation(String),
    #[error("post-login confirmation did not appear in time: {0}")]
    ConfirmationTimeout(String),
    #[error("failed to write screenshot: {0}")]
    Screenshot(#[source] std::io::Error),
}

impl BrowserLoginError {
    fn automation<E: std::fmt::Display>(error: E) -> Self {
        Self::Automation(error.to_string())
    }
}

/// Completes the human-approval step of device activation. The vendor's
/// activation page has no API-only credential endpoint, so this is a real
/// UI walk: approve the device, sign in, wait for the confirmation
/// screen.
pub trait LoginDriver {
    fn complete_login(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<(), BrowserLoginError>;
}

/// Drives the flow in a headless Chrome instance, blocking until the
/// confirmation element appears or the bounded waits run out.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessChromeLogin;

impl LoginDriver for HeadlessChromeLogin {
    fn complete_login(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<(), BrowserLoginError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .map_err(BrowserLoginError::automation)?;
        let browser = Browser::new(options).map_err(BrowserLoginError::automation)?;
        let tab = browser.new_tab().map_err(BrowserLoginError::automation)?;

        tab.navigate_to(url).map_err(BrowserLoginError::automation)?;
        tab.wait_until_navigated()
            .map_err(BrowserLoginError::automation)?;

        // Device-approval page first: a lone Submit button.
        tab.set_default_timeout(SUBMIT_WAIT);
        tab.wait_for_xpath(SUBMIT_BUTTON)
            .map_err(BrowserLoginError::automation)?
            .click()
            .map_err(BrowserLoginError::automation)?;

        tab.wait_for_element(LOGIN_ID_FIELD)
            .map_err(BrowserLoginError::automation)?;

        tab.find_element(LOGIN_ID_FIELD)
            .map_err(BrowserLoginError::automation)?
            .click()
            .map_err(BrowserLoginError::automation)?;
        tab.type_str(username).map_err(BrowserLoginError::automation)?;

        tab.find_element(PASSWORD_FIELD)
            .map_err(BrowserLoginError::automation)?
            .click()
            .map_err(BrowserLoginError::automation)?;
        tab.type_str(password).map_err(BrowserLoginError::automation)?;

        tab.find_element_by_xpath(SIGN_IN_BUTTON)
            .map_err(BrowserLoginError::automation)?
            .click()
            .map_err(BrowserLoginError::automation)?;

        write_screenshot(&tab, LOGIN_SCREENSHOT_PATH)?;

        tab.set_default_timeout(CONFIRMATION_WAIT);
        tab.wait_for_element(CONFIRMATION_ELEMENT)
            .map_err(|error| BrowserLoginError::ConfirmationTimeout(error.to_string()))?;

        write_screenshot(&tab, CONFIRMATION_SCREENSHOT_PATH)?;

        Ok(())
    }
}

fn write_screenshot(
    tab: &headless_chrome::Tab,
    path: &str,
) -> Result<(), BrowserLoginError> {
    let png = tab
        .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        .map_err(BrowserLoginError::automation)?;
    std::fs::write(path, png).map_err(BrowserLoginError::Screenshot)
}
