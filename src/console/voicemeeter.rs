//! Voicemeeter Remote adapter
//!
//! Loads the VoicemeeterRemote library at runtime and exposes it through
//! [`ConsoleRemote`]. Voicemeeter has no push API: dirty flags are polled on
//! a timer and turned into notifications.

use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::{ConsoleRemote, Notification, NotificationSender};
use crate::config::VoicemeeterConfig;
use crate::error::{BridgeError, Result};

const DEFAULT_INSTALL_DIR: &str = r"C:\Program Files (x86)\VB\Voicemeeter";

/// Size of the buffer GetParameterStringA writes into
const PARAMETER_STRING_LEN: usize = 512;

/// Macro button read mode returning the button state
const MACROBUTTON_MODE_DEFAULT: i32 = 0;

type NoArgFn = unsafe extern "system" fn() -> i32;
type GetTypeFn = unsafe extern "system" fn(*mut i32) -> i32;
type GetFloatFn = unsafe extern "system" fn(*const c_char, *mut f32) -> i32;
type GetStringFn = unsafe extern "system" fn(*const c_char, *mut c_char) -> i32;
type ButtonStatusFn = unsafe extern "system" fn(i32, *mut f32, i32) -> i32;

/// Voicemeeter edition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicemeeterKind {
    Basic,
    Banana,
    Potato,
}

impl VoicemeeterKind {
    pub fn parse(kind: &str) -> Result<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "basic" => Ok(VoicemeeterKind::Basic),
            "banana" => Ok(VoicemeeterKind::Banana),
            "potato" => Ok(VoicemeeterKind::Potato),
            other => Err(BridgeError::Config(format!(
                "unknown Voicemeeter kind '{other}' (expected basic, banana or potato)"
            ))),
        }
    }

    /// Type id reported by VBVMR_GetVoicemeeterType
    fn type_id(self) -> i32 {
        match self {
            VoicemeeterKind::Basic => 1,
            VoicemeeterKind::Banana => 2,
            VoicemeeterKind::Potato => 3,
        }
    }
}

/// Default location of the remote library for this build's pointer width
pub fn default_dll_path() -> PathBuf {
    let file = if cfg!(target_pointer_width = "64") {
        "VoicemeeterRemote64.dll"
    } else {
        "VoicemeeterRemote.dll"
    };
    Path::new(DEFAULT_INSTALL_DIR).join(file)
}

/// Entry points resolved from the loaded library
struct RemoteApi {
    login: NoArgFn,
    logout: NoArgFn,
    get_type: GetTypeFn,
    parameters_dirty: NoArgFn,
    buttons_dirty: NoArgFn,
    get_float: GetFloatFn,
    get_string: GetStringFn,
    button_status: ButtonStatusFn,
    // Keeps the function pointers above valid
    _library: libloading::Library,
}

impl RemoteApi {
    fn load(path: &Path) -> Result<Self> {
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            BridgeError::Console(format!("failed to load {}: {}", path.display(), e))
        })?;

        unsafe {
            let login = symbol::<NoArgFn>(&library, b"VBVMR_Login\0")?;
            let logout = symbol::<NoArgFn>(&library, b"VBVMR_Logout\0")?;
            let get_type = symbol::<GetTypeFn>(&library, b"VBVMR_GetVoicemeeterType\0")?;
            let parameters_dirty = symbol::<NoArgFn>(&library, b"VBVMR_IsParametersDirty\0")?;
            let buttons_dirty = symbol::<NoArgFn>(&library, b"VBVMR_MacroButton_IsDirty\0")?;
            let get_float = symbol::<GetFloatFn>(&library, b"VBVMR_GetParameterFloat\0")?;
            let get_string = symbol::<GetStringFn>(&library, b"VBVMR_GetParameterStringA\0")?;
            let button_status =
                symbol::<ButtonStatusFn>(&library, b"VBVMR_MacroButton_GetStatus\0")?;

            Ok(Self {
                login,
                logout,
                get_type,
                parameters_dirty,
                buttons_dirty,
                get_float,
                get_string,
                button_status,
                _library: library,
            })
        }
    }
}

unsafe fn symbol<T: Copy>(library: &libloading::Library, name: &[u8]) -> Result<T> {
    library.get::<T>(name).map(|s| *s).map_err(|e| {
        let printable = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name));
        BridgeError::Console(format!("missing symbol {printable}: {e}"))
    })
}

/// Connection to a running Voicemeeter through its remote library
pub struct VoicemeeterRemote {
    api: Arc<RemoteApi>,
    kind: VoicemeeterKind,
    poll_interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl VoicemeeterRemote {
    /// Load the remote library named by `config` (or the default install)
    pub fn load(config: &VoicemeeterConfig) -> Result<Self> {
        let kind = VoicemeeterKind::parse(&config.kind)?;
        let path = config
            .dll_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_dll_path);

        info!("Loading Voicemeeter Remote from {}", path.display());
        let api = RemoteApi::load(&path)?;

        Ok(Self {
            api: Arc::new(api),
            kind,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poller: Mutex::new(None),
        })
    }

    fn check_kind(&self) {
        let mut running = 0i32;
        let code = unsafe { (self.api.get_type)(&mut running) };
        if code != 0 {
            debug!("Could not read Voicemeeter type (code {})", code);
        } else if running != self.kind.type_id() {
            warn!(
                "Configured Voicemeeter kind is {:?} but type {} is running",
                self.kind, running
            );
        }
    }

    fn read_parameter_float(&self, name: &CStr) -> std::result::Result<f32, i32> {
        let mut value = 0f32;
        match unsafe { (self.api.get_float)(name.as_ptr(), &mut value) } {
            0 => Ok(value),
            code => Err(code),
        }
    }
}

#[async_trait]
impl ConsoleRemote for VoicemeeterRemote {
    fn name(&self) -> &str {
        "Voicemeeter"
    }

    async fn login(&self) -> Result<()> {
        match unsafe { (self.api.login)() } {
            0 => info!("Logged in to Voicemeeter {:?}", self.kind),
            1 => warn!("Logged in, but Voicemeeter is not running yet"),
            code => {
                return Err(BridgeError::Console(format!(
                    "Voicemeeter login failed (code {code})"
                )))
            }
        }

        self.check_kind();
        // First poll after login reports everything dirty; consume it
        unsafe {
            (self.api.parameters_dirty)();
            (self.api.buttons_dirty)();
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }

        match unsafe { (self.api.logout)() } {
            0 => {
                info!("Logged out of Voicemeeter");
                Ok(())
            }
            code => Err(BridgeError::Console(format!(
                "Voicemeeter logout failed (code {code})"
            ))),
        }
    }

    async fn subscribe(&self, kinds: &[Notification], sink: NotificationSender) -> Result<()> {
        let poll_parameters = kinds.contains(&Notification::ParametersDirty);
        let poll_buttons = kinds.contains(&Notification::ButtonsDirty);
        for kind in kinds {
            if let Notification::Other(tag) = kind {
                warn!("Voicemeeter cannot signal '{}', ignoring", tag);
            }
        }

        let api = self.api.clone();
        let period = self.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if poll_parameters && unsafe { (api.parameters_dirty)() } == 1 {
                    trace!("Voicemeeter parameters dirty");
                    if sink.send(Notification::ParametersDirty).is_err() {
                        break;
                    }
                }
                if poll_buttons && unsafe { (api.buttons_dirty)() } == 1 {
                    trace!("Voicemeeter macro buttons dirty");
                    if sink.send(Notification::ButtonsDirty).is_err() {
                        break;
                    }
                }
            }

            debug!("Voicemeeter poller stopped");
        });

        if let Some(previous) = self.poller.lock().replace(task) {
            previous.abort();
        }

        info!(
            "Polling Voicemeeter every {} ms (parameters: {}, buttons: {})",
            period.as_millis(),
            poll_parameters,
            poll_buttons
        );
        Ok(())
    }

    async fn get_parameter_string(&self, name: &str) -> Result<String> {
        let c_name = CString::new(name)
            .map_err(|_| BridgeError::Console(format!("invalid parameter name '{name}'")))?;

        let mut buffer = [0 as c_char; PARAMETER_STRING_LEN];
        let code = unsafe { (self.api.get_string)(c_name.as_ptr(), buffer.as_mut_ptr()) };
        if code == 0 {
            let value = unsafe { CStr::from_ptr(buffer.as_ptr()) };
            return Ok(value.to_string_lossy().into_owned());
        }

        // Numeric parameters are only readable as floats
        self.read_parameter_float(&c_name)
            .map(|value| format!("{value:.3}"))
            .map_err(|float_code| {
                BridgeError::Console(format!(
                    "cannot read parameter '{name}' (codes {code}, {float_code})"
                ))
            })
    }

    async fn get_button_state(&self, index: u32) -> Result<bool> {
        let logical = i32::try_from(index)
            .map_err(|_| BridgeError::Console(format!("button index {index} out of range")))?;

        let mut value = 0f32;
        match unsafe { (self.api.button_status)(logical, &mut value, MACROBUTTON_MODE_DEFAULT) } {
            0 => Ok(value != 0.0),
            code => Err(BridgeError::Console(format!(
                "cannot read macro button {index} (code {code})"
            ))),
        }
    }
}

impl Drop for VoicemeeterRemote {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!(VoicemeeterKind::parse("banana").unwrap(), VoicemeeterKind::Banana);
        assert_eq!(VoicemeeterKind::parse("Potato").unwrap(), VoicemeeterKind::Potato);
        assert_eq!(VoicemeeterKind::parse("basic").unwrap().type_id(), 1);
        assert!(VoicemeeterKind::parse("mango").is_err());
    }

    #[test]
    fn test_default_dll_path() {
        let path = default_dll_path();
        let file = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file.starts_with("VoicemeeterRemote"));
        assert!(file.ends_with(".dll"));
    }

    #[test]
    fn test_missing_library_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = VoicemeeterConfig {
            dll_path: Some(dir.path().join("nope.dll").to_string_lossy().into_owned()),
            ..VoicemeeterConfig::default()
        };

        assert!(matches!(
            VoicemeeterRemote::load(&config),
            Err(BridgeError::Console(_))
        ));
    }

    #[test]
    fn test_unknown_kind_fails_before_loading() {
        let config = VoicemeeterConfig {
            kind: "mango".to_string(),
            ..VoicemeeterConfig::default()
        };
        assert!(matches!(
            VoicemeeterRemote::load(&config),
            Err(BridgeError::Config(_))
        ));
    }
}
