// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, span, warn, Level, Span};

/// A web request routed to a plugin.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WebAction {
    pub action: String,
    pub parameters: String,
    pub data: String,
    pub reference: String,
}

/// An extension that can watch and alter a running show. Everything except the name is
/// optional; the defaults do nothing.
pub trait Plugin: Send {
    /// The name the plugin is registered under.
    fn name(&self) -> &str;

    /// The label to show for the plugin in a menu.
    fn menu_label(&self) -> String {
        self.name().to_string()
    }

    /// The folder the plugin serves web content from, if any.
    fn virtual_web_folder(&self) -> String {
        String::new()
    }

    /// Called once when the plugin is registered. Should not interact with the user.
    fn load(&mut self, _show_dir: &Path) -> bool {
        true
    }

    /// Called when the plugin should start doing its work.
    fn start(&mut self, _show_dir: &Path, _url: &str) -> bool {
        true
    }

    fn stop(&mut self) {}

    /// Called just before the plugin is dropped.
    fn unload(&mut self) {}

    fn wipe_settings(&mut self) {}

    /// Called with every rendered frame before it goes out.
    fn on_buffer_ready(&mut self, _buffer: &mut [u8]) {}

    /// Called with the show's status as JSON whenever it changes.
    fn on_status(&mut self, _status: &str) {}

    /// Handles a web request. Returns the response, or None if the plugin didn't handle it.
    fn on_web_action(&mut self, _action: &WebAction) -> Option<String> {
        None
    }
}

struct PluginState {
    plugin: Box<dyn Plugin>,
    id: u32,
    started: bool,
}

/// Hosts the plugins of a show and fans calls out to them.
pub struct PluginHost {
    /// Registered plugins by name.
    plugins: BTreeMap<String, PluginState>,
    /// The id handed to the next registered plugin.
    next_id: u32,
    /// The show directory passed to plugins.
    show_dir: PathBuf,
    /// The logging span.
    span: Span,
}

impl PluginHost {
    /// Creates a new plugin host for the given show directory.
    pub fn new(show_dir: &Path) -> PluginHost {
        PluginHost {
            plugins: BTreeMap::new(),
            next_id: 1,
            show_dir: show_dir.to_path_buf(),
            span: span!(Level::INFO, "plugins"),
        }
    }

    /// Loads and registers a plugin, returning its id. A plugin registered under a name that is
    /// already taken replaces the old one.
    pub fn register(&mut self, mut plugin: Box<dyn Plugin>) -> u32 {
        let _enter = self.span.enter();

        let name = plugin.name().to_string();
        let loaded = plugin.load(&self.show_dir);
        debug!(plugin = name, loaded, "Loaded plugin.");

        let id = self.next_id;
        self.next_id += 1;
        if let Some(mut replaced) = self.plugins.insert(
            name.clone(),
            PluginState {
                plugin,
                id,
                started: false,
            },
        ) {
            warn!(plugin = name, "Replacing plugin with the same name.");
            if replaced.started {
                replaced.plugin.stop();
            }
            replaced.plugin.unload();
        }

        id
    }

    /// Starts the named plugin. Returns true if it is running.
    pub fn start_plugin(&mut self, name: &str, url: &str) -> bool {
        let _enter = self.span.enter();

        let Some(state) = self.plugins.get_mut(name) else {
            return false;
        };
        if state.started {
            return true;
        }

        state.started = state.plugin.start(&self.show_dir, url);
        info!(plugin = name, started = state.started, "Started plugin.");
        state.started
    }

    /// Stops the named plugin if it is running.
    pub fn stop_plugin(&mut self, name: &str) {
        let _enter = self.span.enter();

        if let Some(state) = self.plugins.get_mut(name) {
            if state.started {
                state.plugin.stop();
                state.started = false;
                info!(plugin = name, "Stopped plugin.");
            }
        }
    }

    pub fn stop_all(&mut self) {
        let names: Vec<String> = self.plugins.keys().cloned().collect();
        for name in names {
            self.stop_plugin(&name);
        }
    }

    pub fn wipe_settings(&mut self) {
        for state in self.plugins.values_mut() {
            state.plugin.wipe_settings();
        }
    }

    /// Returns true if the named plugin is running.
    pub fn is_started(&self, name: &str) -> bool {
        self.plugins.get(name).is_some_and(|state| state.started)
    }

    /// Passes a rendered frame through every plugin.
    pub fn manipulate_buffer(&mut self, buffer: &mut [u8]) {
        for state in self.plugins.values_mut() {
            state.plugin.on_buffer_ready(buffer);
        }
    }

    /// Tells every plugin about the show's status.
    pub fn notify_status(&mut self, status: &str) {
        for state in self.plugins.values_mut() {
            state.plugin.on_status(status);
        }
    }

    /// Routes a web request to the named plugin.
    pub fn handle_web(&mut self, name: &str, action: &WebAction) -> Option<String> {
        self.plugins
            .get_mut(name)
            .and_then(|state| state.plugin.on_web_action(action))
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.plugins.get(name).map(|state| state.id)
    }

    pub fn plugin_from_id(&self, id: u32) -> Option<&str> {
        self.plugins
            .iter()
            .find(|(_, state)| state.id == id)
            .map(|(name, _)| name.as_str())
    }

    /// The names of all registered plugins, sorted.
    pub fn plugins(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn menu_label(&self, name: &str) -> String {
        self.plugins
            .get(name)
            .map(|state| state.plugin.menu_label())
            .unwrap_or_default()
    }

    /// The web folder of the named plugin. Empty unless the plugin is running.
    pub fn virtual_web_folder(&self, name: &str) -> String {
        match self.plugins.get(name) {
            Some(state) if state.started => state.plugin.virtual_web_folder(),
            _ => String::new(),
        }
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        self.stop_all();
        for state in self.plugins.values_mut() {
            state.plugin.unload();
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use super::{Plugin, PluginHost, WebAction};

    /// A plugin that records what it's told and inverts every frame.
    #[derive(Clone, Default)]
    pub struct RecordingPlugin {
        pub name: String,
        pub events: Arc<Mutex<Vec<String>>>,
        pub statuses: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingPlugin {
        pub fn new(name: &str) -> RecordingPlugin {
            RecordingPlugin {
                name: name.to_string(),
                ..Default::default()
            }
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().expect("unable to get lock").clone()
        }

        pub fn statuses(&self) -> Vec<String> {
            self.statuses.lock().expect("unable to get lock").clone()
        }

        fn record(&self, event: &str) {
            self.events
                .lock()
                .expect("unable to get lock")
                .push(event.to_string());
        }
    }

    impl Plugin for RecordingPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn virtual_web_folder(&self) -> String {
            format!("/{}", self.name)
        }

        fn load(&mut self, show_dir: &Path) -> bool {
            self.record(&format!("load {}", show_dir.display()));
            true
        }

        fn start(&mut self, _show_dir: &Path, url: &str) -> bool {
            self.record(&format!("start {}", url));
            true
        }

        fn stop(&mut self) {
            self.record("stop");
        }

        fn unload(&mut self) {
            self.record("unload");
        }

        fn wipe_settings(&mut self) {
            self.record("wipe");
        }

        fn on_buffer_ready(&mut self, buffer: &mut [u8]) {
            buffer.iter_mut().for_each(|channel| *channel = 255 - *channel);
        }

        fn on_status(&mut self, status: &str) {
            self.statuses
                .lock()
                .expect("unable to get lock")
                .push(status.to_string());
        }

        fn on_web_action(&mut self, action: &WebAction) -> Option<String> {
            (action.action == "ping").then(|| format!("pong {}", action.reference))
        }
    }

    /// A plugin that refuses to start.
    struct Stubborn;

    impl Plugin for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        fn start(&mut self, _show_dir: &Path, _url: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_lifecycle() {
        let plugin = RecordingPlugin::new("recorder");
        {
            let mut host = PluginHost::new(Path::new("/show"));
            assert_eq!(1, host.register(Box::new(plugin.clone())));
            assert_eq!(2, host.register(Box::new(Stubborn)));
            assert_eq!(vec!["recorder", "stubborn"], host.plugins());

            assert!(host.start_plugin("recorder", "http://localhost"));
            // Starting twice doesn't call the plugin again.
            assert!(host.start_plugin("recorder", "http://localhost"));
            assert!(!host.start_plugin("stubborn", "http://localhost"));
            assert!(!host.start_plugin("missing", "http://localhost"));

            host.wipe_settings();
            host.stop_plugin("recorder");
            host.stop_plugin("recorder");
            assert!(!host.is_started("recorder"));
            assert!(host.start_plugin("recorder", "http://other"));
        }

        assert_eq!(
            vec![
                "load /show",
                "start http://localhost",
                "wipe",
                "stop",
                "start http://other",
                "stop",
                "unload"
            ],
            plugin.events()
        );
    }

    #[test]
    fn test_ids_and_labels() {
        let mut host = PluginHost::new(Path::new("/show"));
        host.register(Box::new(RecordingPlugin::new("a")));
        host.register(Box::new(RecordingPlugin::new("b")));

        assert_eq!(Some(2), host.id_of("b"));
        assert_eq!(None, host.id_of("c"));
        assert_eq!(Some("a"), host.plugin_from_id(1));
        assert_eq!(None, host.plugin_from_id(7));
        assert_eq!("b", host.menu_label("b"));
        assert_eq!("", host.menu_label("c"));

        // The web folder is only available while running.
        assert_eq!("", host.virtual_web_folder("a"));
        host.start_plugin("a", "");
        assert_eq!("/a", host.virtual_web_folder("a"));
    }

    #[test]
    fn test_buffer_status_and_web() {
        let plugin = RecordingPlugin::new("recorder");
        let mut host = PluginHost::new(Path::new("/show"));
        host.register(Box::new(plugin.clone()));

        let mut buffer = [0u8, 10, 255];
        host.manipulate_buffer(&mut buffer);
        assert_eq!([255u8, 245, 0], buffer);

        host.notify_status(r#"{"running":true}"#);
        assert_eq!(vec![r#"{"running":true}"#], plugin.statuses());

        let ping = WebAction {
            action: "ping".to_string(),
            reference: "42".to_string(),
            ..Default::default()
        };
        assert_eq!(Some("pong 42".to_string()), host.handle_web("recorder", &ping));
        assert_eq!(None, host.handle_web("missing", &ping));
        let other = WebAction {
            action: "other".to_string(),
            ..Default::default()
        };
        assert_eq!(None, host.handle_web("recorder", &other));
    }

    #[test]
    fn test_replace() {
        let first = RecordingPlugin::new("dup");
        let mut host = PluginHost::new(Path::new("/show"));
        host.register(Box::new(first.clone()));
        host.start_plugin("dup", "");
        assert_eq!(2, host.register(Box::new(RecordingPlugin::new("dup"))));
        assert_eq!(vec!["load /show", "start ", "stop", "unload"], first.events());
        assert!(!host.is_started("dup"));
    }
}
