//! View mode management for the TUI.


/// What the main content area shows.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum ViewMode {
    /// Playlist beside the spectrum.
    #[default]
    Player,

    /// Key bindings and commands.
    Help,
}


impl ViewMode {
    /// Header caption.
    pub fn title( self ) -> &'static str {
        match self {
            ViewMode::Player => "PLAYER",
            ViewMode::Help => "HELP",
        }
    }


    /// Key hints for the status bar.
    pub fn hint( self ) -> &'static str {
        match self {
            ViewMode::Player => " [p]Play [Space]Pause [s]Stop [n/b]Next/Prev [Enter]Select [/]Cmd [?]Help [q]Quit ",
            ViewMode::Help => " [?]Close [Esc]Close ",
        }
    }
}
