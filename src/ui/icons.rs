//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

// Lifecycle stages
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "[>]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏳ ", "[T]");
pub static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[D]");
pub static REPORT: Emoji<'_, '_> = Emoji("📄 ", "");
