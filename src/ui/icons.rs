//! Shared UI icons.
//!
//! Each icon has a plain-text fallback for terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Pipeline indicators
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static COMPONENT: Emoji<'_, '_> = Emoji("🧩 ", "[C]");
pub static REPAIR: Emoji<'_, '_> = Emoji("🔧 ", "[FIX]");
pub static PREVIEW: Emoji<'_, '_> = Emoji("🌐 ", "[URL]");
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[PROG]");
