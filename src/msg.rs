/// A menu selection read from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Help,
    ListPlugins,
    RunPlugin,
    InstallPlugin,
    PluginInfo,
    Quit,
    Invalid(String),
}

impl Msg {
    pub const MENU: [(&'static str, &'static str); 6] = [
        ("1", "Help/Info"),
        ("2", "List Available Plugins"),
        ("3", "Load and Execute a Plugin"),
        ("4", "Install Plugin from Library"),
        ("5", "Load Plugin Info"),
        ("0", "Exit"),
    ];

    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "1" => Msg::Help,
            "2" => Msg::ListPlugins,
            "3" => Msg::RunPlugin,
            "4" => Msg::InstallPlugin,
            "5" => Msg::PluginInfo,
            "0" => Msg::Quit,
            other => Msg::Invalid(other.to_string()),
        }
    }
}
