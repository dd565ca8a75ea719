use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use dvcman::loader::{is_path, resolve_plugin_path};
use dvcman::{
    ChannelManager, DvcManConfig, DvcManErrorKind, DylibPluginLoader, LoadOutcome, PluginLoader as _, PluginState,
    StaticPluginLoader,
};
use dvcman_testsuite::{register_one, EventLog, RecordingPlugin};
use rstest::rstest;

fn suffixed(name: &str) -> String {
    format!("{name}{}", std::env::consts::DLL_SUFFIX)
}

const ECHO_PLUGIN_STEM: &str = "dvcman_echo_plugin";

/// `target/<profile>`, the directory the test binary was built into (its parent is `deps`).
fn artifact_dir() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    exe.parent().and_then(Path::parent).unwrap().to_path_buf()
}

fn echo_plugin_name() -> String {
    format!("{}{ECHO_PLUGIN_STEM}", std::env::consts::DLL_PREFIX)
}

/// Path to the built echo plugin library, building it first when the workspace build did not.
fn echo_plugin_library() -> &'static Path {
    static LIBRARY: OnceLock<PathBuf> = OnceLock::new();

    LIBRARY.get_or_init(|| {
        let dir = artifact_dir();
        let path = dir.join(suffixed(&echo_plugin_name()));

        if !path.exists() {
            let profile = match dir.file_name().and_then(|name| name.to_str()) {
                Some("debug") | None => "dev".to_owned(),
                Some(profile) => profile.to_owned(),
            };

            let status = Command::new(option_env!("CARGO").unwrap_or("cargo"))
                .args(["build", "--package", "dvcman-echo-plugin", "--profile", &profile])
                .arg("--target-dir")
                .arg(dir.parent().unwrap())
                .status()
                .unwrap();
            assert!(status.success(), "building dvcman-echo-plugin failed: {status}");
        }

        assert!(path.exists(), "{} not found", path.display());
        path
    })
}

#[rstest]
#[case("echo", false)]
#[case("libecho.so", false)]
#[case("./libecho.so", true)]
#[case("/usr/lib/dvcman/plugins/echo.so", true)]
fn path_detection(#[case] name_or_path: &str, #[case] expected: bool) {
    assert_eq!(is_path(name_or_path), expected);
}

#[test]
fn bare_names_are_resolved_in_the_plugin_directory() {
    let resolved = resolve_plugin_path("cliprdr", Path::new("/opt/dvc"));
    assert_eq!(resolved, Path::new("/opt/dvc").join(suffixed("cliprdr")));
}

#[test]
fn paths_are_used_verbatim() {
    let resolved = resolve_plugin_path("./plugins/cliprdr.so", Path::new("/opt/dvc"));
    assert_eq!(resolved, PathBuf::from("./plugins/cliprdr.so"));
}

#[test]
fn dylib_loader_uses_configured_directory() {
    let config = DvcManConfig::default().with_plugin_dir("/srv/dvc-plugins");
    let loader = DylibPluginLoader::from_config(&config);

    assert_eq!(loader.plugin_dir(), Path::new("/srv/dvc-plugins"));
    assert_eq!(loader.resolve("rdpsnd"), Path::new("/srv/dvc-plugins").join(suffixed("rdpsnd")));
}

#[test]
fn missing_library_is_a_load_error() {
    let mut manager = ChannelManager::with_config(DvcManConfig::default().with_plugin_dir("/nonexistent/dvcman"));

    let error = manager.load_plugin("/nonexistent/dvcman/cliprdr.so").unwrap_err();
    assert!(matches!(error.kind(), DvcManErrorKind::Load));

    let error = manager.load_plugin("cliprdr").unwrap_err();
    assert!(matches!(error.kind(), DvcManErrorKind::Load));

    assert_eq!(manager.plugin_count(), 0);
    assert_eq!(manager.listener_count(), 0);
    assert_eq!(manager.module_count(), 0);
}

#[test]
fn file_that_is_not_a_library_is_a_load_error() {
    let path = std::env::temp_dir().join(format!("dvcman-not-a-library-{}{}", std::process::id(), std::env::consts::DLL_SUFFIX));
    std::fs::write(&path, b"definitely not a shared object").unwrap();

    let mut loader = DylibPluginLoader::new(std::env::temp_dir());
    let result = loader.load(path.to_str().unwrap());

    let _ = std::fs::remove_file(&path);

    let error = result.err().unwrap();
    assert!(matches!(error.kind(), DvcManErrorKind::Load));
}

#[test]
fn unknown_static_plugin_is_a_load_error() {
    let mut manager = ChannelManager::with_loader(DvcManConfig::default(), StaticPluginLoader::new());

    let error = manager.load_plugin("rdpgfx").unwrap_err();

    assert!(matches!(error.kind(), DvcManErrorKind::Load));
    assert_eq!(
        error.report().to_string(),
        "[load static plugin] plugin load error, caused by: no plugin named `rdpgfx`"
    );
    assert_eq!(manager.module_count(), 0);
}

#[test]
fn module_without_entry_point_is_silently_skipped() {
    let loader = StaticPluginLoader::new().with_module_without_entry_point("legacy");
    let mut manager = ChannelManager::with_loader(DvcManConfig::default(), loader);

    let outcome = manager.load_plugin("legacy").unwrap();

    assert_eq!(outcome, LoadOutcome::MissingEntryPoint);
    assert_eq!(manager.plugin_count(), 0);
    assert_eq!(manager.listener_count(), 0);
    // The module itself stays loaded.
    assert_eq!(manager.module_count(), 1);
}

#[test]
fn static_loader_accepts_paths_by_file_stem() {
    let log = EventLog::new();
    let entry_log = log.clone();
    let loader = StaticPluginLoader::new().with_plugin(
        "rdpsnd",
        register_one(move || RecordingPlugin::new("rdpsnd", &entry_log).boxed()),
    );
    assert!(loader.contains("rdpsnd"));

    let mut manager = ChannelManager::with_loader(DvcManConfig::default(), loader);
    let outcome = manager.load_plugin("/usr/lib/dvcman/plugins/rdpsnd.so").unwrap();

    assert_eq!(outcome, LoadOutcome::EntryPointInvoked { registered: 1 });
    assert_eq!(manager.plugins().names().collect::<Vec<_>>(), vec!["rdpsnd"]);
}

#[test]
fn same_module_may_be_loaded_twice() {
    let log = EventLog::new();
    let entry_log = log.clone();
    let loader = StaticPluginLoader::new().with_plugin(
        "echo",
        register_one(move || RecordingPlugin::new("echo", &entry_log).with_listener("ECHO").boxed()),
    );

    let mut manager = ChannelManager::with_loader(DvcManConfig::default(), loader);
    manager.load_plugin("echo").unwrap();
    manager.load_plugin("echo").unwrap();
    manager.initialize();

    assert_eq!(manager.plugin_count(), 2);
    assert_eq!(manager.listener_count(), 2);
    assert_eq!(manager.module_count(), 2);
}

#[cfg(target_os = "linux")]
#[test]
fn shared_library_without_entry_point_stays_loaded() {
    // The C library is mapped into every dynamically linked process and exports no DVC entry point.
    let maps = std::fs::read_to_string("/proc/self/maps").unwrap();
    let libc = maps
        .lines()
        .filter_map(|line| line.split_whitespace().nth(5))
        .find(|path| {
            Path::new(path)
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("libc.so") || name.starts_with("libc-"))
        })
        .unwrap();

    let mut manager = ChannelManager::with_config(DvcManConfig::default());

    let outcome = manager.load_plugin(libc).unwrap();

    assert_eq!(outcome, LoadOutcome::MissingEntryPoint);
    assert_eq!(manager.plugin_count(), 0);
    assert_eq!(manager.listener_count(), 0);
    assert_eq!(manager.module_count(), 1);

    manager.free();
}

#[test]
fn echo_plugin_library_round_trip() {
    let library = echo_plugin_library();
    let library = library.to_str().unwrap();

    let mut manager = ChannelManager::with_config(DvcManConfig::default());

    let outcome = manager.load_plugin(library).unwrap();

    assert_eq!(outcome, LoadOutcome::EntryPointInvoked { registered: 1 });
    assert_eq!(manager.plugins().names().collect::<Vec<_>>(), vec![library]);
    assert_eq!(manager.plugin_states(), vec![PluginState::Registered]);
    assert_eq!(manager.listener_count(), 0);
    assert_eq!(manager.module_count(), 1);

    manager.initialize();

    assert_eq!(manager.plugin_states(), vec![PluginState::Initialized]);
    assert_eq!(manager.listener_count(), 1);

    let listener = manager.find_listener_mut("ECHO").unwrap();
    assert_eq!(listener.flags(), 0);
    assert!(listener.callback_mut().on_new_channel_connection(3));
    assert!(listener.callback_mut().on_new_channel_connection(4));

    manager.free();
}

#[test]
fn echo_plugin_is_found_by_name_in_the_plugin_directory() {
    let library = echo_plugin_library();
    let plugin_dir = library.parent().unwrap();

    let config = DvcManConfig::with_capacity(2).with_plugin_dir(plugin_dir);
    let mut manager = ChannelManager::with_config(config);

    let outcome = manager.load_plugin(&echo_plugin_name()).unwrap();
    assert_eq!(outcome, LoadOutcome::EntryPointInvoked { registered: 1 });

    // The library is already mapped; its entry point still runs again and registers a new plugin object.
    manager.load_plugin(&echo_plugin_name()).unwrap();
    manager.initialize();

    assert_eq!(manager.plugin_count(), 2);
    assert_eq!(manager.module_count(), 2);
    assert_eq!(manager.listeners().find_all("ECHO").count(), 2);
}
