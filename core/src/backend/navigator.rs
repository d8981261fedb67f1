//! Host contract for `getURL`, `loadMovie` and `loadVariables`.

/// How request data is sent, as encoded in the `GetUrl2` opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NavigationMethod {
    None,
    Get,
    Post,
}

impl NavigationMethod {
    /// Decode the two method bits of a `GetUrl2` payload.
    pub fn from_send_vars_method(method: u8) -> Self {
        match method {
            1 => Self::Get,
            2 => Self::Post,
            _ => Self::None,
        }
    }
}

pub trait NavigatorBackend {
    /// Open a URL in a browsing context (the `GetURL` family with a
    /// window target).
    fn navigate_to_url(&mut self, url: &str, window: &str, method: NavigationMethod);

    /// Replace the movie at `target_path` with the one loaded from `url`.
    fn load_movie(&mut self, url: &str, target_path: &str, method: NavigationMethod);

    /// Load `name=value` pairs from `url` into the object at `target_path`.
    fn load_variables(&mut self, url: &str, target_path: &str, method: NavigationMethod);
}

/// A navigator that records nothing and goes nowhere.
#[derive(Default)]
pub struct NullNavigatorBackend;

impl NavigatorBackend for NullNavigatorBackend {
    fn navigate_to_url(&mut self, url: &str, window: &str, _method: NavigationMethod) {
        log::info!("getURL: {} (window: {})", url, window);
    }

    fn load_movie(&mut self, url: &str, target_path: &str, _method: NavigationMethod) {
        log_unimpl!("loadMovie(\"{}\", \"{}\") ignored", url, target_path);
    }

    fn load_variables(&mut self, url: &str, target_path: &str, _method: NavigationMethod) {
        log_unimpl!("loadVariables(\"{}\", \"{}\") ignored", url, target_path);
    }
}
