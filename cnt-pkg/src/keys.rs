//! Embedded RSA-2048 keysets for the PKG key-derivation chain.
//!
//! Two keysets are compiled in: one for the entry-key blob ("DK3") and one
//! for the PFS image key ("PKG"). Each is stored as its CRT components and
//! materialized once, lazily, into an [`RsaPrivateKey`].

use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use std::sync::LazyLock;

const DK3_N: [u8; 256] = [
    0xF4, 0x6C, 0x1E, 0x58, 0x44, 0x82, 0xBE, 0x87, 0xDB, 0xA6, 0x36, 0x78,
    0x5B, 0xF7, 0xB5, 0xB5, 0x36, 0x88, 0x09, 0x0D, 0xBE, 0x49, 0x01, 0xEC,
    0xB3, 0x49, 0x2A, 0xD7, 0x49, 0xA9, 0x5E, 0xF0, 0x42, 0x84, 0x47, 0xD1,
    0x57, 0xB0, 0x58, 0x52, 0xDA, 0xAB, 0xB8, 0x8E, 0xD3, 0x56, 0x53, 0xBD,
    0x95, 0x4F, 0xF4, 0x6C, 0x97, 0xA5, 0xA3, 0xBC, 0x71, 0x17, 0x56, 0xB8,
    0x59, 0xDC, 0x4D, 0x1D, 0x65, 0x80, 0xC1, 0x97, 0x97, 0x3D, 0x35, 0x83,
    0x15, 0x03, 0xAC, 0x13, 0x2B, 0x28, 0x3E, 0x83, 0xF9, 0x7E, 0x31, 0x9E,
    0x69, 0x2C, 0xDF, 0xA5, 0xB3, 0x56, 0xA4, 0x5B, 0xD7, 0x3A, 0xB7, 0x1F,
    0x9E, 0x5D, 0xEB, 0x8F, 0x0F, 0xF8, 0xD5, 0xBB, 0x97, 0x8A, 0x95, 0x99,
    0xD4, 0x80, 0x4C, 0x48, 0xDF, 0x16, 0x99, 0x86, 0x88, 0xD5, 0xF9, 0xA9,
    0x8B, 0xBF, 0x11, 0x4B, 0x51, 0xA8, 0x7E, 0xF8, 0xD1, 0x4B, 0xD9, 0x60,
    0xB5, 0xBF, 0x4D, 0x0C, 0x5E, 0xCA, 0x63, 0x91, 0x31, 0x01, 0xC4, 0x2C,
    0x55, 0xD6, 0x8D, 0xCE, 0x53, 0xF2, 0x96, 0x59, 0x2A, 0x45, 0x05, 0x70,
    0xEA, 0x94, 0x3C, 0xC0, 0x3F, 0xF0, 0x0D, 0x8E, 0x96, 0xFC, 0x62, 0x42,
    0x76, 0x29, 0x16, 0x14, 0xFE, 0x7F, 0xF5, 0x25, 0xE4, 0x65, 0xB0, 0xFD,
    0x35, 0xF4, 0x85, 0xDC, 0xE1, 0xA7, 0x99, 0xDE, 0xFF, 0xFC, 0x94, 0xA0,
    0x5F, 0xC5, 0x25, 0xAB, 0x3A, 0x93, 0x8A, 0x96, 0xB6, 0x9C, 0x3A, 0xBB,
    0xAE, 0x8C, 0xE4, 0xB5, 0xC3, 0x2A, 0x9A, 0xAE, 0xE3, 0x60, 0xC3, 0x65,
    0xA4, 0x66, 0xB1, 0x18, 0x33, 0x1F, 0xB9, 0xF0, 0x5A, 0x6E, 0xD1, 0x69,
    0x2F, 0x53, 0x95, 0x2D, 0x8F, 0xB8, 0xBB, 0xF4, 0x68, 0x14, 0xA3, 0x74,
    0xFC, 0xEC, 0x3E, 0x48, 0xBD, 0x69, 0x54, 0x69, 0x6B, 0x68, 0xF0, 0xE7,
    0x48, 0xAF, 0xE4, 0xD7,
];

const DK3_E: [u8; 3] = [
    0x01, 0x00, 0x01,
];

const DK3_D: [u8; 256] = [
    0x0C, 0x52, 0x0C, 0xDF, 0x87, 0x28, 0x8E, 0x01, 0x1C, 0x25, 0xCF, 0x36,
    0x16, 0xF0, 0xB0, 0x14, 0x9F, 0xD8, 0x90, 0x98, 0x44, 0x40, 0xBA, 0xDB,
    0x9B, 0x17, 0xF3, 0x94, 0x61, 0x8E, 0xAB, 0x8D, 0xF1, 0xD4, 0x68, 0x28,
    0x59, 0xC2, 0xB6, 0x59, 0x0A, 0xD3, 0xC0, 0x1C, 0x56, 0xF3, 0xD1, 0x89,
    0xCB, 0x66, 0x79, 0xDC, 0x25, 0x72, 0xC0, 0x83, 0xA5, 0xB1, 0xB6, 0xF9,
    0xD8, 0xF1, 0xBD, 0x63, 0x5F, 0x73, 0xF3, 0x8E, 0x38, 0x1D, 0xEA, 0x3E,
    0x1E, 0xC7, 0x8E, 0x1B, 0x73, 0x3F, 0xF6, 0x92, 0xC1, 0x77, 0x46, 0x7A,
    0x05, 0x34, 0x31, 0x5B, 0xD1, 0x63, 0xEB, 0x2A, 0x03, 0xF9, 0xDE, 0x34,
    0x36, 0x4F, 0xE6, 0xA9, 0x51, 0xF5, 0x49, 0x94, 0xC8, 0xA9, 0x40, 0x2C,
    0x3E, 0x65, 0x6F, 0x32, 0xF7, 0x27, 0xD4, 0xFA, 0x4E, 0x98, 0x76, 0x9A,
    0xC0, 0xC4, 0x13, 0x53, 0x98, 0x1C, 0xA5, 0xB5, 0xBC, 0xE3, 0x14, 0x3D,
    0x3A, 0xBC, 0x83, 0xD0, 0x25, 0x3B, 0x63, 0xBA, 0xE8, 0x6D, 0xEB, 0x80,
    0x65, 0xCA, 0x98, 0x65, 0x6C, 0x51, 0x93, 0x5B, 0x1D, 0xC2, 0x79, 0x8A,
    0xBD, 0x0A, 0x24, 0x8A, 0x36, 0x66, 0xC3, 0xAD, 0x32, 0x38, 0xAE, 0xA0,
    0x47, 0x05, 0x15, 0x15, 0x48, 0x86, 0xF0, 0x64, 0xD0, 0x4F, 0x45, 0x7D,
    0xAE, 0x6A, 0x8A, 0xBE, 0xA5, 0x08, 0x29, 0x31, 0x39, 0x2A, 0x54, 0x64,
    0x63, 0x78, 0xA8, 0xA4, 0xE1, 0x48, 0xCF, 0xF5, 0x9D, 0x31, 0x5A, 0xAD,
    0xDB, 0x22, 0xC5, 0x8E, 0x28, 0x5E, 0x3F, 0xEB, 0xAF, 0x34, 0x28, 0x31,
    0xE2, 0x59, 0x1F, 0x0D, 0xA6, 0x0E, 0xC3, 0x5E, 0x5E, 0x97, 0x11, 0x24,
    0x12, 0xD3, 0xC9, 0x97, 0x81, 0xD4, 0x67, 0x06, 0x8E, 0xC6, 0xF0, 0x13,
    0xA6, 0x88, 0xDA, 0xD0, 0x2C, 0xF4, 0x70, 0xBF, 0xA7, 0xEB, 0xB0, 0x57,
    0x03, 0x7A, 0x57, 0x79,
];

const DK3_P: [u8; 128] = [
    0xFB, 0xC3, 0xBE, 0x5A, 0x87, 0x81, 0xE7, 0x13, 0x8D, 0xD7, 0xE7, 0x0D,
    0xFB, 0x8E, 0x90, 0x57, 0xB5, 0xDC, 0x39, 0xA5, 0x3D, 0xA4, 0x68, 0x8E,
    0xF8, 0x72, 0x51, 0x5E, 0xD9, 0x30, 0x9C, 0x7D, 0xBC, 0x4A, 0x65, 0x8B,
    0xF6, 0x13, 0xBA, 0xDD, 0xD0, 0x37, 0x52, 0xB7, 0x67, 0x5F, 0xBB, 0xC9,
    0xAA, 0x7E, 0xC3, 0x11, 0xF3, 0xDA, 0x43, 0x6A, 0x17, 0xD0, 0x6B, 0xC1,
    0x86, 0xD3, 0x64, 0x2D, 0x81, 0xE2, 0xAC, 0x77, 0xC1, 0xFB, 0xC1, 0x84,
    0x57, 0x31, 0x5F, 0x12, 0x0B, 0xEE, 0xDA, 0x2B, 0xC5, 0xFA, 0x43, 0xD4,
    0x54, 0x99, 0x66, 0x38, 0x7F, 0x52, 0xE5, 0x03, 0x7B, 0x91, 0x10, 0xC8,
    0x74, 0xD3, 0x52, 0x6B, 0x17, 0x3E, 0x84, 0x8E, 0x29, 0x0C, 0x24, 0x65,
    0x33, 0x0A, 0x65, 0xA9, 0x5D, 0x52, 0x32, 0x28, 0x04, 0x57, 0x5A, 0xBB,
    0xCF, 0x46, 0xDF, 0x46, 0x87, 0x6C, 0xAE, 0xB9,
];

const DK3_Q: [u8; 128] = [
    0xF8, 0x88, 0xC1, 0x25, 0x7D, 0x6B, 0x59, 0x22, 0x63, 0x54, 0x70, 0xF1,
    0x64, 0x6C, 0xA8, 0xDC, 0x28, 0x67, 0xE3, 0xDE, 0xF2, 0xA8, 0x8F, 0xC3,
    0xFC, 0x76, 0x31, 0x03, 0x2E, 0xCE, 0xA3, 0x72, 0xC2, 0x2F, 0xAA, 0x92,
    0x13, 0xB9, 0x96, 0x9E, 0x72, 0x75, 0xF5, 0x8D, 0x96, 0xCC, 0x75, 0xAB,
    0x5E, 0xBE, 0x60, 0x7F, 0x33, 0x5C, 0x8A, 0xF7, 0xC8, 0xE3, 0x0E, 0xDA,
    0xFE, 0xAD, 0x9F, 0x0D, 0xC9, 0x76, 0x20, 0xE4, 0xE5, 0xEB, 0xE2, 0xC4,
    0x3F, 0x56, 0x68, 0xE0, 0xDD, 0x1D, 0x76, 0xEB, 0x53, 0xAD, 0xC7, 0x6B,
    0x12, 0xD7, 0x10, 0x74, 0x5B, 0xAB, 0xCE, 0xF7, 0x4C, 0xB3, 0x52, 0x28,
    0xB6, 0xBA, 0x8D, 0x96, 0xD6, 0x1B, 0x76, 0xE4, 0x2E, 0xC5, 0x03, 0x82,
    0xD2, 0xD1, 0x37, 0xAA, 0xA4, 0x2C, 0x67, 0xE0, 0xBB, 0x31, 0x3A, 0x6A,
    0xA4, 0x6F, 0xDA, 0x2A, 0x65, 0xCA, 0xE8, 0x0F,
];

const PKG_N: [u8; 256] = [
    0xF1, 0xB7, 0x54, 0xB6, 0xF6, 0xF2, 0x0D, 0x5D, 0x21, 0xC4, 0xF5, 0xA5,
    0xE9, 0x5D, 0x27, 0x09, 0xD6, 0xCC, 0x57, 0x33, 0x6B, 0xC2, 0x17, 0x16,
    0x45, 0xE7, 0xB1, 0xD9, 0x0C, 0x1A, 0xF5, 0xFF, 0x38, 0x04, 0x0E, 0x32,
    0x18, 0xBB, 0x5E, 0xB8, 0x38, 0x97, 0x63, 0x79, 0x72, 0xF0, 0xED, 0x8B,
    0x3E, 0x47, 0x86, 0x4D, 0x4E, 0x12, 0xFA, 0x85, 0xFB, 0xE9, 0xB0, 0x7B,
    0x50, 0x06, 0x0A, 0x59, 0x40, 0xC9, 0x8D, 0xE3, 0xC3, 0x57, 0x1C, 0x57,
    0xA0, 0x97, 0x3A, 0x19, 0x96, 0x99, 0x2F, 0xFA, 0xDC, 0xEC, 0x22, 0xC5,
    0xAF, 0xC1, 0x94, 0x63, 0x69, 0x92, 0x14, 0x2B, 0xA2, 0xD6, 0x93, 0x83,
    0x3B, 0x95, 0x4B, 0x60, 0x4E, 0x1A, 0xC8, 0xC6, 0x13, 0xB6, 0x21, 0xE3,
    0x32, 0x04, 0xF0, 0xE0, 0xDD, 0x10, 0x30, 0x63, 0x45, 0x2A, 0x6D, 0xDC,
    0xED, 0x0E, 0x0C, 0x40, 0x9A, 0xFD, 0x05, 0x81, 0x4F, 0xF5, 0xD6, 0xD2,
    0xF5, 0xC5, 0x58, 0xD0, 0xA0, 0x31, 0x0D, 0x79, 0x42, 0x4B, 0xAB, 0x3D,
    0x61, 0xFF, 0x40, 0x5C, 0x80, 0xBF, 0x95, 0x99, 0xBB, 0xBE, 0xC5, 0x06,
    0xEC, 0x9D, 0xC6, 0x29, 0xEB, 0xD7, 0xB4, 0x23, 0x9D, 0xDF, 0xB4, 0xDC,
    0xDC, 0x28, 0xCE, 0x9B, 0x02, 0x9A, 0x9B, 0xAE, 0x7D, 0x1D, 0x93, 0x23,
    0x92, 0xE2, 0x7B, 0xF6, 0x90, 0x7E, 0x91, 0xAE, 0x2E, 0x58, 0x83, 0x47,
    0x31, 0x47, 0xCD, 0x02, 0xFE, 0xFE, 0x86, 0x4D, 0x44, 0xF3, 0xE2, 0xBB,
    0xB7, 0x57, 0x4B, 0xB6, 0x67, 0x7C, 0x68, 0x28, 0xDA, 0x91, 0xE2, 0xE2,
    0x3F, 0x24, 0x0D, 0x10, 0xD1, 0x82, 0x7C, 0x8C, 0xE6, 0x35, 0x5F, 0xE5,
    0x80, 0x82, 0x2F, 0xFB, 0x01, 0x13, 0x52, 0x02, 0x79, 0x00, 0x1C, 0x34,
    0x74, 0xF9, 0x04, 0x90, 0xD8, 0x48, 0xCC, 0x00, 0x7D, 0xAD, 0xAD, 0x31,
    0x7D, 0x01, 0x54, 0xCB,
];

const PKG_E: [u8; 3] = [
    0x01, 0x00, 0x01,
];

const PKG_D: [u8; 256] = [
    0x21, 0x32, 0x2C, 0xE3, 0xBD, 0xD1, 0x6B, 0x4D, 0x6D, 0x8C, 0x57, 0xB2,
    0x33, 0xF4, 0xF3, 0x9E, 0x11, 0xCE, 0x59, 0x71, 0x79, 0xEC, 0x9B, 0x70,
    0x17, 0x24, 0xA5, 0x53, 0xAA, 0x2A, 0x6F, 0xBB, 0x5F, 0xCD, 0x8A, 0xC7,
    0x8D, 0x86, 0xFA, 0x10, 0xB1, 0xD0, 0xF4, 0xBB, 0xE2, 0xB1, 0xBC, 0xE5,
    0xE1, 0x25, 0x40, 0x88, 0x10, 0x5F, 0x61, 0xE1, 0x91, 0xC1, 0xBB, 0xD7,
    0x8B, 0x9B, 0x70, 0xC3, 0x66, 0x36, 0xE8, 0x12, 0x2E, 0x2B, 0x21, 0xFC,
    0xD4, 0xD4, 0xC0, 0x09, 0x70, 0x99, 0xD4, 0x31, 0x8F, 0x32, 0xAC, 0xE9,
    0xDA, 0x63, 0xEB, 0x05, 0xA6, 0x23, 0x86, 0x3A, 0xA1, 0xEF, 0xF7, 0x2D,
    0x50, 0x3B, 0x06, 0x31, 0x91, 0x38, 0x73, 0x77, 0x64, 0x90, 0xA0, 0x61,
    0xCB, 0xE6, 0x4A, 0xD0, 0x8E, 0xFB, 0xA0, 0xB1, 0x99, 0x77, 0xA4, 0xC3,
    0xF1, 0x18, 0x7B, 0x4D, 0x4A, 0x1B, 0xD2, 0xAB, 0xF5, 0xDE, 0xD1, 0xF7,
    0x82, 0xD7, 0x12, 0xEF, 0xE5, 0x36, 0xEB, 0x8B, 0x14, 0x6F, 0xD9, 0x71,
    0x82, 0xB2, 0xF1, 0xE2, 0xBD, 0x3D, 0x86, 0x1D, 0xFD, 0xB0, 0x3B, 0xB0,
    0x22, 0xE3, 0xA2, 0x32, 0x0E, 0xC9, 0xCB, 0x7F, 0x5E, 0x21, 0x08, 0x68,
    0x98, 0x3F, 0xB4, 0x6D, 0xE3, 0xF6, 0xD3, 0xD3, 0xE8, 0x50, 0xA5, 0x67,
    0x7F, 0x43, 0x9B, 0xA8, 0x28, 0xB1, 0xA0, 0xCD, 0x32, 0x25, 0xB4, 0xFB,
    0xE3, 0x3C, 0xD5, 0x3A, 0x2A, 0x30, 0x7F, 0xC3, 0x34, 0xB5, 0x24, 0x73,
    0x13, 0x69, 0x05, 0x61, 0x9F, 0x06, 0xC2, 0x05, 0x0C, 0x4B, 0xD4, 0xC6,
    0xAB, 0xAF, 0x7E, 0x42, 0x87, 0x7A, 0x90, 0xCD, 0x69, 0xCE, 0x84, 0xCD,
    0xAC, 0x30, 0xE3, 0xAD, 0xD7, 0xE0, 0xFB, 0xFA, 0xC4, 0x74, 0x5D, 0x65,
    0xD7, 0xEE, 0xCF, 0x4F, 0x41, 0xA3, 0x83, 0x9C, 0x39, 0x59, 0x9B, 0xB1,
    0x02, 0x72, 0xAD, 0x85,
];

const PKG_P: [u8; 128] = [
    0xFF, 0x01, 0x01, 0x11, 0xD8, 0xA6, 0x2E, 0x6B, 0xEF, 0xA0, 0xE7, 0xBB,
    0xBA, 0x55, 0x50, 0xBB, 0xCA, 0x01, 0xCA, 0x55, 0x85, 0x46, 0x4B, 0x49,
    0xA9, 0xC2, 0x73, 0xD9, 0xE2, 0xBC, 0x83, 0x66, 0xF4, 0x38, 0x2D, 0xF5,
    0x99, 0x8A, 0x18, 0x71, 0x6E, 0xA1, 0x41, 0x15, 0xC9, 0x93, 0x4D, 0x71,
    0x15, 0x6E, 0x6F, 0xA5, 0x9F, 0xCB, 0x37, 0xEB, 0x83, 0x83, 0x18, 0xF7,
    0xBB, 0x3B, 0xB7, 0x2C, 0xD2, 0xAF, 0xB4, 0x99, 0x73, 0x6F, 0xA3, 0x92,
    0xFB, 0x7B, 0x58, 0xE5, 0x85, 0x7C, 0x52, 0xD4, 0x6E, 0x00, 0x3D, 0xDF,
    0xCD, 0x3C, 0x46, 0x85, 0x15, 0x2A, 0x33, 0x7F, 0x53, 0x89, 0x9F, 0xDD,
    0x12, 0xD7, 0xE2, 0xBC, 0xBE, 0xED, 0x75, 0x94, 0xB8, 0xF2, 0xE6, 0xC3,
    0x19, 0x5A, 0x10, 0x54, 0x9C, 0xD7, 0x37, 0x77, 0x50, 0xBD, 0xB1, 0x0E,
    0x7F, 0xAF, 0xCB, 0xF2, 0xB7, 0x53, 0x29, 0x37,
];

const PKG_Q: [u8; 128] = [
    0xF2, 0xA9, 0x0A, 0x14, 0x6D, 0xAB, 0x65, 0x2F, 0x82, 0xEE, 0x87, 0x19,
    0xAC, 0x1D, 0x7E, 0x8C, 0x1D, 0x0F, 0xB0, 0xC5, 0x51, 0x81, 0x87, 0x4E,
    0xDD, 0xF1, 0x69, 0xAB, 0x40, 0x69, 0x54, 0x3B, 0xFA, 0x57, 0xF7, 0xCD,
    0xEB, 0x4B, 0x16, 0x09, 0xA6, 0xA9, 0xA6, 0x97, 0x0F, 0x39, 0xBD, 0xA1,
    0x31, 0x57, 0xAF, 0x50, 0x23, 0x36, 0x95, 0x69, 0x1D, 0x92, 0x0F, 0xFA,
    0x12, 0xF3, 0x2E, 0x7F, 0x97, 0x63, 0x64, 0x48, 0x9F, 0xF9, 0xB7, 0xEA,
    0x53, 0xED, 0x8C, 0x43, 0x29, 0xD1, 0x47, 0x73, 0xBB, 0x8D, 0xDA, 0xF6,
    0xB7, 0x19, 0x5D, 0xE3, 0x9D, 0x4E, 0xA0, 0x19, 0x50, 0x6E, 0xB1, 0x5E,
    0x72, 0x8F, 0xD4, 0x63, 0x55, 0x9C, 0x2F, 0x10, 0xC7, 0xE5, 0x9A, 0x66,
    0x0E, 0xCB, 0xC7, 0xB0, 0xE0, 0x2D, 0x50, 0x4A, 0x61, 0xAD, 0xA0, 0xB8,
    0x32, 0x87, 0xCC, 0x52, 0x77, 0x04, 0x2B, 0x0D,
];

fn build_key(n: &[u8], e: &[u8], d: &[u8], p: &[u8], q: &[u8]) -> RsaPrivateKey {
    RsaPrivateKey::from_components(
        BigUint::from_bytes_be(n),
        BigUint::from_bytes_be(e),
        BigUint::from_bytes_be(d),
        vec![BigUint::from_bytes_be(p), BigUint::from_bytes_be(q)],
    )
    .expect("embedded keyset is a valid RSA-2048 key")
}

/// Private key for the entry-keys blob (entry 0x10, key slot 3).
pub(crate) static DK3_KEY: LazyLock<RsaPrivateKey> =
    LazyLock::new(|| build_key(&DK3_N, &DK3_E, &DK3_D, &DK3_P, &DK3_Q));

/// Private key for the PFS image key (entry 0x20).
pub(crate) static PKG_KEY: LazyLock<RsaPrivateKey> =
    LazyLock::new(|| build_key(&PKG_N, &PKG_E, &PKG_D, &PKG_P, &PKG_Q));

/// Public half of the DK3 keyset.
///
/// Only needed to author fixtures: real PKGs already carry ciphertexts
/// produced under this modulus.
#[must_use]
pub fn dk3_public_key() -> RsaPublicKey {
    DK3_KEY.to_public_key()
}

/// Public half of the PKG keyset. See [`dk3_public_key()`].
#[must_use]
pub fn pkg_public_key() -> RsaPublicKey {
    PKG_KEY.to_public_key()
}
