/// Filler phrases to look for in a transcript. Entries may span several
/// words; matching is done over the tokenized word stream.
#[derive(Debug, Clone)]
pub struct FillerLexicon {
    entries: Vec<String>,
}

impl FillerLexicon {
    pub fn new(entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| e.into().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { entries }
    }

    /// Lexicon for the language code, falling back to Russian.
    pub fn for_language(code: &str) -> Self {
        match code {
            "en" => Self::english(),
            _ => Self::russian(),
        }
    }

    pub fn russian() -> Self {
        Self::new([
            "ну",
            "как бы",
            "короче",
            "в общем",
            "по сути",
            "на самом деле",
            "вроде бы",
            "это самое",
            "типа",
            "значит",
            "получается",
            "вот",
            "эээ",
            "ммм",
            "как это",
            "то есть",
            "скажем",
            "вот это",
            "так сказать",
            "в общем-то",
            "вообще",
            "получается так",
            "ещё бы",
            "такой",
            "так",
            "просто",
            "реально",
            "типа того",
            "всё такое",
            "ну да",
            "ну вот",
            "ну типа",
            "и всё такое",
        ])
    }

    pub fn english() -> Self {
        Self::new([
            "um",
            "uh",
            "er",
            "like",
            "you know",
            "sort of",
            "kind of",
            "i mean",
            "basically",
            "actually",
            "literally",
            "well",
            "so",
            "right",
            "anyway",
            "i guess",
            "you see",
        ])
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
