//! Spectra CLI - Terminal audio player with a spectrum visualizer

mod cli;
mod input;
mod logging;
mod settings;
mod surface;
mod view;

use std::io;
use std::thread;
use std::time::{ Duration, Instant };

use anyhow::{ Context, Result };
use clap::Parser;
use crossterm::{
    event::{ self, Event, KeyCode, KeyEvent, KeyEventKind },
    terminal::{ disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, List, ListItem, ListState, Paragraph, Wrap },
};
use tokio::sync::mpsc;

use cli::Args;
use input::{ InputBuffer, InputMode };
use settings::Settings;
use surface::PixelSurface;
use view::ViewMode;

use spectra_core::{
    host::NativeMedia,
    intent,
    library::LibraryScanner,
    AnalysisAdapter, EngineState, FrameCancel, FrameSchedule, Intent, MediaEvent, Playlist,
    SoftwareContext, Transport, Visualizer,
};


type Player = Transport<NativeMedia, SoftwareContext>;


/// Terminal events forwarded from the reader thread.
#[derive( Debug )]
enum AppEvent {
    Key( KeyEvent ),
    Resize,
}


/// Application state.
struct App {
    transport: Player,
    visualizer: Visualizer,
    surface: PixelSurface,
    should_quit: bool,

    view_mode: ViewMode,
    playlist_state: ListState,

    input_mode: InputMode,
    input_buffer: InputBuffer,

    status_message: Option<String>,
    status_clear_at: Option<Instant>,
}


impl App {
    fn new( args: &Args ) -> Result<Self> {
        let playlist = build_playlist( args )?;
        tracing::info!( "Starting with {} tracks", playlist.len() );

        let mut playlist_state = ListState::default();
        if !playlist.is_empty() {
            playlist_state.select( Some( playlist.current_index() ) );
        }

        let analysis = AnalysisAdapter::new( || Ok( SoftwareContext::new() ) );
        let transport = Transport::new( playlist, NativeMedia::new(), analysis );

        Ok( Self {
            transport,
            visualizer: Visualizer::new(),
            surface: PixelSurface::new(),
            should_quit: false,
            view_mode: ViewMode::default(),
            playlist_state,
            input_mode: InputMode::default(),
            input_buffer: InputBuffer::new(),
            status_message: None,
            status_clear_at: None,
        })
    }


    /// Sets a status message that auto-clears after a delay.
    fn set_status( &mut self, msg: impl Into<String> ) {
        self.status_message = Some( msg.into() );
        self.status_clear_at = Some( Instant::now() + Duration::from_secs( 3 ) );
    }


    /// Per-frame update: expires status messages and pumps media events.
    fn tick( &mut self ) {
        if let Some( clear_at ) = self.status_clear_at {
            if Instant::now() >= clear_at {
                self.status_message = None;
                self.status_clear_at = None;
            }
        }

        for event in self.transport.pump() {
            match event {
                MediaEvent::Ended => {
                    let name = self.transport.track_label().text().to_string();
                    self.set_status( format!( "Finished {}", name ) );
                }
                MediaEvent::Error( e ) => self.set_status( format!( "Playback error: {}", e ) ),
                _ => {}
            }
        }
    }


    /// Routes an intent to the transport and keeps the cursor on the current track.
    fn dispatch( &mut self, intent: Intent ) {
        tracing::debug!( "Dispatching {:?}", intent );
        if let Err( e ) = self.transport.handle( intent ) {
            tracing::warn!( "{:?} failed: {}", intent, e );
            self.set_status( format!( "Error: {}", e ) );
        }

        if matches!( intent, Intent::Next | Intent::Previous | Intent::SelectTrack( _ ) )
            && !self.transport.playlist().is_empty()
        {
            self.playlist_state.select( Some( self.transport.playlist().current_index() ) );
        }
    }


    fn handle_event( &mut self, event: AppEvent ) {
        match event {
            AppEvent::Key( key ) => self.handle_key( key.code ),
            AppEvent::Resize => tracing::debug!( "Terminal resized" ),
        }
    }


    fn handle_key( &mut self, code: KeyCode ) {
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key( code ),
            InputMode::Command => self.handle_command_key( code ),
        }
    }


    fn handle_normal_key( &mut self, code: KeyCode ) {
        if self.view_mode == ViewMode::Help {
            self.handle_help_key( code );
            return;
        }

        match code {
            KeyCode::Char( 'q' ) => self.should_quit = true,
            KeyCode::Char( '?' ) => self.view_mode = ViewMode::Help,
            KeyCode::Char( '/' ) => {
                self.input_mode = InputMode::Command;
                self.input_buffer.clear();
            }
            KeyCode::Char( 'p' ) => self.dispatch( Intent::Play ),
            KeyCode::Char( ' ' ) => self.dispatch( Intent::Pause ),
            KeyCode::Char( 's' ) => self.dispatch( Intent::Stop ),
            KeyCode::Char( 'n' ) => self.dispatch( Intent::Next ),
            KeyCode::Char( 'b' ) => self.dispatch( Intent::Previous ),
            KeyCode::Up | KeyCode::Char( 'k' ) => self.playlist_select_previous(),
            KeyCode::Down | KeyCode::Char( 'j' ) => self.playlist_select_next(),
            KeyCode::Enter => {
                if let Some( idx ) = self.playlist_state.selected() {
                    self.dispatch( Intent::SelectTrack( idx ) );
                }
            }
            _ => {}
        }
    }


    fn handle_help_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Char( 'q' ) | KeyCode::Esc | KeyCode::Char( '?' ) => {
                self.view_mode = ViewMode::Player;
            }
            _ => {}
        }
    }


    fn handle_command_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter => {
                let input = self.input_buffer.take();
                self.input_mode = InputMode::Normal;
                self.execute_command( &input );
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Backspace => {
                if self.input_buffer.is_empty() {
                    self.input_mode = InputMode::Normal;
                } else {
                    self.input_buffer.backspace();
                }
            }
            KeyCode::Delete => self.input_buffer.delete(),
            KeyCode::Left => self.input_buffer.move_left(),
            KeyCode::Right => self.input_buffer.move_right(),
            KeyCode::Home => self.input_buffer.move_home(),
            KeyCode::End => self.input_buffer.move_end(),
            KeyCode::Char( c ) => self.input_buffer.insert( c ),
            _ => {}
        }
    }


    fn execute_command( &mut self, input: &str ) {
        match Intent::parse( input ) {
            Ok( intent ) => {
                self.dispatch( intent );
                if self.status_message.is_none() {
                    self.set_status( intent.description() );
                }
            }
            Err( e ) => self.set_status( e.to_string() ),
        }
    }


    fn playlist_select_next( &mut self ) {
        let len = self.transport.playlist().len();
        if len == 0 {
            return;
        }
        let i = match self.playlist_state.selected() {
            Some( i ) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.playlist_state.select( Some( i ) );
    }


    fn playlist_select_previous( &mut self ) {
        let len = self.transport.playlist().len();
        if len == 0 {
            return;
        }
        let i = match self.playlist_state.selected() {
            Some( i ) if i > 0 => i - 1,
            _ => len - 1,
        };
        self.playlist_state.select( Some( i ) );
    }
}


/// Builds the startup playlist: the M3U file first, then scanned paths.
fn build_playlist( args: &Args ) -> Result<Playlist> {
    let mut playlist = match &args.playlist {
        Some( path ) => Playlist::load_m3u( path )
            .with_context( || format!( "Failed to load playlist {:?}", path ) )?,
        None => Playlist::new(),
    };

    if !args.files.is_empty() {
        let mut scanner = LibraryScanner::new();
        for path in &args.files {
            scanner.add_root( path.clone() );
        }
        playlist.add_many( scanner.scan()? );
    }

    Ok( playlist )
}


/// Forwards terminal events from a blocking reader thread.
fn spawn_input_reader( tx: mpsc::UnboundedSender<AppEvent> ) {
    thread::spawn( move || loop {
        let event = match event::read() {
            Ok( Event::Key( key ) ) if key.kind == KeyEventKind::Press => AppEvent::Key( key ),
            Ok( Event::Resize( _, _ ) ) => AppEvent::Resize,
            Ok( _ ) => continue,
            Err( e ) => {
                tracing::error!( "Terminal input failed: {}", e );
                break;
            }
        };
        if tx.send( event ).is_err() {
            break;
        }
    });
}


#[tokio::main( flavor = "current_thread" )]
async fn main() -> Result<()> {
    let args = Args::parse();
    let ( settings, problem ) = Settings::load();
    let settings = settings.with_args( &args );
    logging::init( settings.level() )?;
    if let Some( problem ) = problem {
        tracing::warn!( "{}", problem );
    }

    let mut app = App::new( &args )?;
    if settings.autoplay {
        app.dispatch( Intent::Play );
    }

    enable_raw_mode()?;
    io::stdout().execute( EnterAlternateScreen )?;
    let mut terminal = Terminal::new( CrosstermBackend::new( io::stdout() ) )?;

    let ( tx, rx ) = mpsc::unbounded_channel();
    spawn_input_reader( tx );
    let ( frames, cancel ) = FrameSchedule::new( settings.frame_rate );

    let result = run( &mut terminal, &mut app, frames, cancel, rx ).await;

    disable_raw_mode()?;
    io::stdout().execute( LeaveAlternateScreen )?;

    tracing::info!(
        "Exiting after {} frames ({} skipped)",
        app.visualizer.frames_drawn(),
        app.visualizer.frames_skipped()
    );
    result
}


/// Frame loop: one tick and redraw per frame, input handled between frames.
async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut frames: FrameSchedule,
    cancel: FrameCancel,
    mut events: mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    loop {
        tokio::select! {
            alive = frames.next_frame() => {
                if !alive {
                    break;
                }
                app.tick();
                terminal.draw( |frame| draw_ui( frame, app ) )?;
            }
            event = events.recv() => match event {
                Some( event ) => {
                    app.handle_event( event );
                    if app.should_quit {
                        cancel.cancel();
                    }
                }
                None => {
                    tracing::error!( "Terminal input closed, stopping" );
                    cancel.cancel();
                }
            },
        }
    }
    Ok(())
}


/// Draws the main UI.
fn draw_ui( frame: &mut Frame, app: &mut App ) {
    let chunks = Layout::default()
        .direction( Direction::Vertical )
        .constraints([
            Constraint::Length( 2 ),  // Header
            Constraint::Min( 0 ),     // Main content
            Constraint::Length( 4 ),  // Now playing
            Constraint::Length( 1 ),  // Status bar
        ])
        .split( frame.area() );

    let header = Paragraph::new( format!( "  SPECTRA - {}", app.view_mode.title() ) )
        .style( Style::default().fg( Color::Cyan ).bold() )
        .block( Block::default().borders( Borders::BOTTOM ) );
    frame.render_widget( header, chunks[0] );

    let main = Layout::default()
        .direction( Direction::Horizontal )
        .constraints([ Constraint::Percentage( 40 ), Constraint::Percentage( 60 ) ])
        .split( chunks[1] );

    match app.view_mode {
        ViewMode::Player => draw_playlist( frame, app, main[0] ),
        ViewMode::Help => draw_help( frame, main[0] ),
    }
    draw_visualizer( frame, app, main[1] );
    draw_now_playing( frame, app, chunks[2] );
    draw_status_bar( frame, app, chunks[3] );
}


fn draw_playlist( frame: &mut Frame, app: &mut App, area: Rect ) {
    let playlist = app.transport.playlist();
    let current = playlist.current_index();

    let items: Vec<ListItem> = playlist
        .tracks()
        .iter()
        .enumerate()
        .map( |( i, track )| {
            let marker = if i == current { "\u{25b6} " } else { "  " };
            ListItem::new( format!( "{}{:>3}. {}", marker, i + 1, track.name() ) )
        })
        .collect();

    let widget = List::new( items )
        .block( Block::default()
            .title( format!( " Playlist ({}) ", playlist.len() ) )
            .borders( Borders::ALL )
        )
        .highlight_style( Style::default().bg( Color::DarkGray ) )
        .highlight_symbol( ">> " );

    frame.render_stateful_widget( widget, area, &mut app.playlist_state );
}


fn draw_help( frame: &mut Frame, area: Rect ) {
    let text = format!(
        "{}\n\nNavigation:\n  Up/Down, j/k    Move the cursor\n  Enter           Play the track under the cursor",
        intent::help_text()
    );
    let help = Paragraph::new( text )
        .block( Block::default().title( " Help (? or Esc to close) " ).borders( Borders::ALL ) )
        .wrap( Wrap { trim: false } );
    frame.render_widget( help, area );
}


fn draw_visualizer( frame: &mut Frame, app: &mut App, area: Rect ) {
    let block = Block::default().title( " Spectrum " ).borders( Borders::ALL );
    let inner = block.inner( area );
    frame.render_widget( block, area );

    app.surface.fit( inner );
    app.visualizer.redraw( app.transport.analysis_mut(), &mut app.surface );
    frame.render_widget( &app.surface, inner );
}


fn draw_now_playing( frame: &mut Frame, app: &App, area: Rect ) {
    let state = match app.transport.state() {
        EngineState::Idle => "\u{25a0} Stopped",
        EngineState::Loading => "\u{2026} Loading",
        EngineState::Playing => "\u{25b6} Playing",
        EngineState::Paused => "\u{23f8} Paused",
    };

    let lines = vec![
        Line::from( Span::styled( format!( " {} ", app.transport.track_label().text() ), Style::default().bold() ) ),
        Line::from( format!( " {}  {}", app.transport.time_display().text(), state ) ),
    ];

    let now_playing = Paragraph::new( lines )
        .block( Block::default().title( " Now Playing " ).borders( Borders::ALL ) );
    frame.render_widget( now_playing, area );
}


fn draw_status_bar( frame: &mut Frame, app: &App, area: Rect ) {
    let ( text, style ) = match app.input_mode {
        InputMode::Command => {
            ( format!( "/{}", app.input_buffer.content() ), Style::default().fg( Color::Yellow ) )
        }
        InputMode::Normal => match &app.status_message {
            Some( msg ) => ( msg.clone(), Style::default().fg( Color::Green ) ),
            None => ( app.view_mode.hint().to_string(), Style::default().fg( Color::DarkGray ) ),
        },
    };

    frame.render_widget( Paragraph::new( text ).style( style ), area );

    if app.input_mode == InputMode::Command {
        let cursor_x = area.x + 1 + app.input_buffer.cursor_char_pos() as u16;
        frame.set_cursor_position(( cursor_x, area.y ));
    }
}


#[cfg( test )]
mod tests {
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;

    use super::*;


    fn idle_app() -> App {
        App::new( &Args::default() ).unwrap()
    }


    #[tokio::test( start_paused = true )]
    async fn test_quit_key_ends_the_loop() {
        let mut terminal = Terminal::new( TestBackend::new( 60, 16 ) ).unwrap();
        let mut app = idle_app();
        let ( frames, cancel ) = FrameSchedule::new( 60 );
        let ( tx, rx ) = mpsc::unbounded_channel();
        tx.send( AppEvent::Key( KeyEvent::new( KeyCode::Char( 'q' ), KeyModifiers::NONE ) ) ).unwrap();

        run( &mut terminal, &mut app, frames, cancel, rx ).await.unwrap();
        assert!( app.should_quit );
    }


    #[tokio::test( start_paused = true )]
    async fn test_closed_input_ends_the_loop() {
        let mut terminal = Terminal::new( TestBackend::new( 60, 16 ) ).unwrap();
        let mut app = idle_app();
        let ( frames, cancel ) = FrameSchedule::new( 60 );
        let ( tx, rx ) = mpsc::unbounded_channel::<AppEvent>();
        drop( tx );

        run( &mut terminal, &mut app, frames, cancel, rx ).await.unwrap();
        assert!( !app.should_quit );
    }


    #[test]
    fn test_command_line_selects_track() {
        let mut app = idle_app();
        app.input_mode = InputMode::Command;
        for c in "select 9".chars() {
            app.handle_key( KeyCode::Char( c ) );
        }
        app.handle_key( KeyCode::Enter );

        assert_eq!( app.input_mode, InputMode::Normal );
        assert!( app.input_buffer.is_empty() );
        assert_eq!( app.transport.state(), EngineState::Idle );
    }
}
