//! Windows Virtual Key (VK) code to display-name table.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! # What is a Windows Virtual Key (VK) code? (for beginners)
//!
//! Windows assigns each keyboard key a number called a "Virtual Key code".
//! These are defined in `<winuser.h>` and named `VK_*` (e.g., `VK_RETURN = 0x0D`,
//! `VK_SPACE = 0x20`).  They are "virtual" because they represent *logical* keys
//! rather than physical scan codes: pressing the letter A on any keyboard layout
//! always produces `VK_A = 0x41`.  The raw-input keyboard record carries the VK
//! code in its `VKey` field, which is why KeyZone binds zones to VK codes.
//!
//! # How this table works
//!
//! `VK_NAME_TABLE` is a compile-time constant array of 256 optional names,
//! indexed by VK code.  Position 0x41 holds `"A"` because Windows VK_A is 0x41.
//! Codes without a sensible display name store `None`.

/// Returns the display name of a Windows VK code, if it has one.
pub fn vk_name(vk: u8) -> Option<&'static str> {
    VK_NAME_TABLE[vk as usize]
}

/// Reverse lookup: finds the VK code whose display name equals `name`
/// (ASCII case-insensitive).
pub fn vk_from_name(name: &str) -> Option<u8> {
    VK_NAME_TABLE
        .iter()
        .position(|entry| entry.is_some_and(|n| n.eq_ignore_ascii_case(name)))
        .map(|vk| vk as u8)
}

/// Complete VK -> name table indexed by VK code (0x00–0xFF).
const VK_NAME_TABLE: [Option<&'static str>; 256] = {
    let mut t: [Option<&'static str>; 256] = [None; 256];

    // ── Mouse buttons ────────────────────────────────────────────────────────
    t[0x01] = Some("Left Mouse Button");
    t[0x02] = Some("Right Mouse Button");
    t[0x04] = Some("Middle Mouse Button");
    t[0x05] = Some("Mouse Button 4");
    t[0x06] = Some("Mouse Button 5");

    // ── Alphabet keys (VK_A=0x41 … VK_Z=0x5A) ────────────────────────────────
    t[0x41] = Some("A");
    t[0x42] = Some("B");
    t[0x43] = Some("C");
    t[0x44] = Some("D");
    t[0x45] = Some("E");
    t[0x46] = Some("F");
    t[0x47] = Some("G");
    t[0x48] = Some("H");
    t[0x49] = Some("I");
    t[0x4A] = Some("J");
    t[0x4B] = Some("K");
    t[0x4C] = Some("L");
    t[0x4D] = Some("M");
    t[0x4E] = Some("N");
    t[0x4F] = Some("O");
    t[0x50] = Some("P");
    t[0x51] = Some("Q");
    t[0x52] = Some("R");
    t[0x53] = Some("S");
    t[0x54] = Some("T");
    t[0x55] = Some("U");
    t[0x56] = Some("V");
    t[0x57] = Some("W");
    t[0x58] = Some("X");
    t[0x59] = Some("Y");
    t[0x5A] = Some("Z");

    // ── Digit row (VK_0=0x30 … VK_9=0x39) ───────────────────────────────────
    t[0x30] = Some("0");
    t[0x31] = Some("1");
    t[0x32] = Some("2");
    t[0x33] = Some("3");
    t[0x34] = Some("4");
    t[0x35] = Some("5");
    t[0x36] = Some("6");
    t[0x37] = Some("7");
    t[0x38] = Some("8");
    t[0x39] = Some("9");

    // ── Control keys ─────────────────────────────────────────────────────────
    t[0x08] = Some("Backspace");    // VK_BACK
    t[0x09] = Some("Tab");          // VK_TAB
    t[0x0D] = Some("Enter");        // VK_RETURN
    t[0x10] = Some("Shift");        // VK_SHIFT
    t[0x11] = Some("Ctrl");         // VK_CONTROL
    t[0x12] = Some("Alt");          // VK_MENU
    t[0x13] = Some("Pause");        // VK_PAUSE
    t[0x14] = Some("Caps Lock");    // VK_CAPITAL
    t[0x1B] = Some("Escape");       // VK_ESCAPE
    t[0x20] = Some("Space");        // VK_SPACE
    t[0x21] = Some("Page Up");      // VK_PRIOR
    t[0x22] = Some("Page Down");    // VK_NEXT
    t[0x23] = Some("End");          // VK_END
    t[0x24] = Some("Home");         // VK_HOME
    t[0x2C] = Some("Print Screen"); // VK_SNAPSHOT
    t[0x2D] = Some("Insert");       // VK_INSERT
    t[0x2E] = Some("Delete");       // VK_DELETE
    t[0x5B] = Some("Left Win");     // VK_LWIN
    t[0x5C] = Some("Right Win");    // VK_RWIN
    t[0x5D] = Some("Menu");         // VK_APPS
    t[0x90] = Some("Num Lock");     // VK_NUMLOCK
    t[0x91] = Some("Scroll Lock");  // VK_SCROLL

    // ── Arrow keys ────────────────────────────────────────────────────────────
    t[0x25] = Some("Left");
    t[0x26] = Some("Up");
    t[0x27] = Some("Right");
    t[0x28] = Some("Down");

    // ── Function keys (VK_F1=0x70 … VK_F24=0x87) ─────────────────────────────
    t[0x70] = Some("F1");
    t[0x71] = Some("F2");
    t[0x72] = Some("F3");
    t[0x73] = Some("F4");
    t[0x74] = Some("F5");
    t[0x75] = Some("F6");
    t[0x76] = Some("F7");
    t[0x77] = Some("F8");
    t[0x78] = Some("F9");
    t[0x79] = Some("F10");
    t[0x7A] = Some("F11");
    t[0x7B] = Some("F12");
    t[0x7C] = Some("F13");
    t[0x7D] = Some("F14");
    t[0x7E] = Some("F15");
    t[0x7F] = Some("F16");
    t[0x80] = Some("F17");
    t[0x81] = Some("F18");
    t[0x82] = Some("F19");
    t[0x83] = Some("F20");
    t[0x84] = Some("F21");
    t[0x85] = Some("F22");
    t[0x86] = Some("F23");
    t[0x87] = Some("F24");

    // ── Numpad ───────────────────────────────────────────────────────────────
    t[0x60] = Some("Numpad 0");
    t[0x61] = Some("Numpad 1");
    t[0x62] = Some("Numpad 2");
    t[0x63] = Some("Numpad 3");
    t[0x64] = Some("Numpad 4");
    t[0x65] = Some("Numpad 5");
    t[0x66] = Some("Numpad 6");
    t[0x67] = Some("Numpad 7");
    t[0x68] = Some("Numpad 8");
    t[0x69] = Some("Numpad 9");
    t[0x6A] = Some("Numpad *");
    t[0x6B] = Some("Numpad +");
    t[0x6D] = Some("Numpad -");
    t[0x6E] = Some("Numpad .");
    t[0x6F] = Some("Numpad /");

    // ── Left/right modifiers ─────────────────────────────────────────────────
    t[0xA0] = Some("Left Shift");
    t[0xA1] = Some("Right Shift");
    t[0xA2] = Some("Left Ctrl");
    t[0xA3] = Some("Right Ctrl");
    t[0xA4] = Some("Left Alt");
    t[0xA5] = Some("Right Alt");

    // ── OEM punctuation (US layout labels) ───────────────────────────────────
    t[0xBA] = Some(";");
    t[0xBB] = Some("=");
    t[0xBC] = Some(",");
    t[0xBD] = Some("-");
    t[0xBE] = Some(".");
    t[0xBF] = Some("/");
    t[0xC0] = Some("`");
    t[0xDB] = Some("[");
    t[0xDC] = Some("\\");
    t[0xDD] = Some("]");
    t[0xDE] = Some("'");

    t
};
