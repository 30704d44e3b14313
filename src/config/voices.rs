//! Kokoro v1.0 voice catalogue.
//!
//! Speaker ids are the positions in the model's voices.bin, which stores the
//! voices in name order; the table below keeps that order so lookups can use
//! binary search and the id is simply the index.

use anyhow::Result;

/// Runtime metadata for one Kokoro voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    pub name: &'static str,
    pub speaker_id: i32,
    pub espeak_code: &'static str,
}

impl Voice {
    /// Human-readable language derived from the espeak code.
    pub fn language(&self) -> &'static str {
        match self.espeak_code {
            "en-us" => "American English",
            "en-gb" => "British English",
            "es" => "Spanish",
            "fr-fr" => "French",
            "hi" => "Hindi",
            "it" => "Italian",
            "ja" => "Japanese",
            "pt-br" => "Portuguese BR",
            "cmn" => "Mandarin Chinese",
            _ => "Unknown",
        }
    }

    /// Voice names encode gender in their second letter (`jf_` / `jm_`).
    pub fn is_female(&self) -> bool {
        self.name.as_bytes().get(1) == Some(&b'f')
    }
}

const VOICES: &[(&str, &str)] = &[
    ("af_alloy", "en-us"),
    ("af_aoede", "en-us"),
    ("af_bella", "en-us"),
    ("af_heart", "en-us"),
    ("af_jessica", "en-us"),
    ("af_kore", "en-us"),
    ("af_nicole", "en-us"),
    ("af_nova", "en-us"),
    ("af_river", "en-us"),
    ("af_sarah", "en-us"),
    ("af_sky", "en-us"),
    ("am_adam", "en-us"),
    ("am_echo", "en-us"),
    ("am_eric", "en-us"),
    ("am_fenrir", "en-us"),
    ("am_liam", "en-us"),
    ("am_michael", "en-us"),
    ("am_onyx", "en-us"),
    ("am_puck", "en-us"),
    ("am_santa", "en-us"),
    ("bf_alice", "en-gb"),
    ("bf_emma", "en-gb"),
    ("bf_isabella", "en-gb"),
    ("bf_lily", "en-gb"),
    ("bm_daniel", "en-gb"),
    ("bm_fable", "en-gb"),
    ("bm_george", "en-gb"),
    ("bm_lewis", "en-gb"),
    ("ef_dora", "es"),
    ("em_alex", "es"),
    ("ff_siwis", "fr-fr"),
    ("hf_alpha", "hi"),
    ("hf_beta", "hi"),
    ("hm_omega", "hi"),
    ("hm_psi", "hi"),
    ("if_sara", "it"),
    ("im_nicola", "it"),
    ("jf_alpha", "ja"),
    ("jf_gongitsune", "ja"),
    ("jf_nezumi", "ja"),
    ("jf_tebukuro", "ja"),
    ("jm_kumo", "ja"),
    ("pf_dora", "pt-br"),
    ("pm_alex", "pt-br"),
    ("pm_santa", "pt-br"),
    ("zf_xiaobei", "cmn"),
    ("zf_xiaoni", "cmn"),
    ("zf_xiaoxiao", "cmn"),
    ("zf_xiaoyi", "cmn"),
    ("zm_yunjian", "cmn"),
    ("zm_yunxi", "cmn"),
    ("zm_yunxia", "cmn"),
    ("zm_yunyang", "cmn"),
];

fn voice_at(index: usize) -> Voice {
    let (name, espeak_code) = VOICES[index];
    Voice { name, speaker_id: index as i32, espeak_code }
}

/// Look up a voice by name.
pub fn get_voice(name: &str) -> Option<Voice> {
    VOICES.binary_search_by_key(&name, |(n, _)| n).ok().map(voice_at)
}

/// Print the Japanese voices first, then everything else.
pub fn print_voices() {
    let (japanese, others): (Vec<Voice>, Vec<Voice>) = (0..VOICES.len()).map(voice_at).partition(|v| v.espeak_code == "ja");

    println!("Kokoro voices for dialogue lines ([男性] uses an m voice, [女性] an f voice):");
    println!();
    println!("{:<15} {:<4} {:<7} LANGUAGE", "VOICE", "ID", "GENDER");
    println!("{}", "─".repeat(50));
    for voice in japanese.iter().chain(others.iter()) {
        println!("{:<15} {:<4} {:<7} {}", voice.name, voice.speaker_id, if voice.is_female() { "female" } else { "male" }, voice.language());
    }
    println!();
    println!("Defaults: jm_kumo ([男性]) and jf_alpha ([女性])");
    println!("Usage: voice-dialogue --backends kokoro --kokoro-voice-a jm_kumo --kokoro-voice-b jf_nezumi");
}

/// Print detailed information about a specific voice.
pub fn print_voice_info(name: &str) -> Result<()> {
    let voice = get_voice(name).ok_or_else(|| anyhow::anyhow!("Voice '{}' not found. Run with --list-voices to see available voices", name))?;

    println!("Voice:       {}", voice.name);
    println!("Speaker ID:  {}", voice.speaker_id);
    println!("Language:    {}", voice.language());
    println!("Gender:      {}", if voice.is_female() { "female" } else { "male" });
    println!("espeak code: {}", voice.espeak_code);

    Ok(())
}
