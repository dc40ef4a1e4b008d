//! Command line entry for the TUI.
//!
//! `/` switches to command mode; the buffer is parsed as an
//! [`Intent`](spectra_core::Intent) on Enter.


/// Current input mode of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum InputMode {
    /// Key bindings active.
    #[default]
    Normal,

    /// Typing a slash command.
    Command,
}


/// Text buffer for the command line.
#[derive( Debug, Default )]
pub struct InputBuffer {
    content: String,
    cursor: usize,
}


impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }


    /// Inserts a character at the cursor position.
    pub fn insert( &mut self, c: char ) {
        self.content.insert( self.cursor, c );
        self.cursor += c.len_utf8();
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if self.cursor > 0 {
            let prev = self.prev_boundary();
            self.content.remove( prev );
            self.cursor = prev;
        }
    }


    /// Deletes the character under the cursor.
    pub fn delete( &mut self ) {
        if self.cursor < self.content.len() {
            self.content.remove( self.cursor );
        }
    }


    pub fn clear( &mut self ) {
        self.content.clear();
        self.cursor = 0;
    }


    /// Takes the typed text and empties the buffer.
    pub fn take( &mut self ) -> String {
        self.cursor = 0;
        std::mem::take( &mut self.content )
    }


    pub fn content( &self ) -> &str {
        &self.content
    }


    /// Cursor position in characters, for display.
    pub fn cursor_char_pos( &self ) -> usize {
        self.content[ ..self.cursor ].chars().count()
    }


    pub fn move_left( &mut self ) {
        self.cursor = self.prev_boundary();
    }


    pub fn move_right( &mut self ) {
        if self.cursor < self.content.len() {
            self.cursor = self.content[ self.cursor.. ]
                .char_indices()
                .nth( 1 )
                .map( |( i, _ )| self.cursor + i )
                .unwrap_or( self.content.len() );
        }
    }


    pub fn move_home( &mut self ) {
        self.cursor = 0;
    }


    pub fn move_end( &mut self ) {
        self.cursor = self.content.len();
    }


    pub fn is_empty( &self ) -> bool {
        self.content.is_empty()
    }


    fn prev_boundary( &self ) -> usize {
        self.content[ ..self.cursor ]
            .char_indices()
            .last()
            .map( |( i, _ )| i )
            .unwrap_or( 0 )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn typed( text: &str ) -> InputBuffer {
        let mut buffer = InputBuffer::new();
        text.chars().for_each( |c| buffer.insert( c ) );
        buffer
    }


    #[test]
    fn test_edit_in_the_middle() {
        let mut buffer = typed( "selct 3" );
        buffer.move_home();
        for _ in 0..3 {
            buffer.move_right();
        }
        buffer.insert( 'e' );

        assert_eq!( buffer.content(), "select 3" );
        assert_eq!( buffer.cursor_char_pos(), 4 );
    }


    #[test]
    fn test_backspace_handles_multibyte() {
        let mut buffer = typed( "plé" );
        buffer.backspace();
        assert_eq!( buffer.content(), "pl" );

        buffer.move_left();
        buffer.delete();
        assert_eq!( buffer.content(), "p" );
    }


    #[test]
    fn test_take_empties_buffer() {
        let mut buffer = typed( "next" );
        assert_eq!( buffer.take(), "next" );
        assert!( buffer.is_empty() );
        assert_eq!( buffer.cursor_char_pos(), 0 );
    }
}
