//! Textual output descriptors
//!
//! Accepts the forms wallets export: a bare descriptor such as
//! `wsh(sortedmulti(2,[fp/48h/0h/0h/2h]xpub.../<0;1>/*,...))#checksum`,
//! a JSON object carrying a `descriptor` field, or a BlueWallet style
//! multisig setup file.

use serde::Deserialize;

use crate::bip32::{self, ExtendedKey, Path, HARDENED};
use crate::error::{CoreError, Result};
use crate::urtypes::{Derivation, KeyDescriptor, MultisigKind, OutputDescriptor, Script};

/// Parse any supported descriptor encoding.
pub fn parse(enc: &str) -> Result<OutputDescriptor> {
    let header = enc.lines().next().unwrap_or_default();
    if header.starts_with("# ")
        && (header.contains("Multisig setup file") || header.contains("Exported from Nunchuk"))
    {
        return parse_setup_file(enc);
    }
    let text_err = match parse_text(enc.trim()) {
        Ok(desc) => return Ok(desc),
        Err(e) => e,
    };

    #[derive(Deserialize)]
    struct Json {
        descriptor: String,
    }
    match serde_json::from_str::<Json>(enc) {
        Ok(json) => parse_text(&json.descriptor),
        Err(_) => Err(text_err),
    }
}

fn err(msg: impl Into<String>) -> CoreError {
    CoreError::Descriptor(msg.into())
}

/// Parse a descriptor in the textual form of Bitcoin Core.
pub fn parse_text(desc: &str) -> Result<OutputDescriptor> {
    let mut body = match desc.rsplit_once('#') {
        Some((d, sum)) if sum.len() == 8 => d,
        _ => desc,
    };

    let script_name = unwrap_func(&mut body)?;
    let mut script = match script_name {
        "wsh" => Script::P2wsh,
        "pkh" => Script::P2pkh,
        "sh" => Script::P2sh,
        "wpkh" => Script::P2wpkh,
        "tr" => Script::P2tr,
        s => return Err(err(format!("unknown script type {s:?}"))),
    };
    let mut kind = MultisigKind::Singlesig;
    let mut inner = body;
    if let Ok(mut name) = unwrap_func(&mut inner) {
        if name == "wpkh" || name == "wsh" {
            if script != Script::P2sh {
                return Err(err(format!("invalid wrapped script type {name:?}")));
            }
            script = if name == "wpkh" {
                Script::P2shP2wpkh
            } else {
                Script::P2shP2wsh
            };
            body = inner;
            match unwrap_func(&mut inner) {
                Ok(n) => name = n,
                Err(_) => name = "",
            }
        }
        match name {
            "" => {}
            "multi" => kind = MultisigKind::Multi,
            "sortedmulti" => kind = MultisigKind::SortedMulti,
            n => return Err(err(format!("unknown script type {n:?}"))),
        }
        if kind != MultisigKind::Singlesig {
            body = inner;
        }
    }

    let (threshold, keys) = match kind {
        MultisigKind::Singlesig => (1, vec![body]),
        _ => {
            let mut args = body.split(',');
            let threshold = args
                .next()
                .and_then(|t| t.trim().parse().ok())
                .ok_or_else(|| err(format!("invalid multikey threshold in {body:?}")))?;
            (threshold, args.collect())
        }
    };
    let keys = keys
        .into_iter()
        .map(|k| parse_key(k.trim()))
        .collect::<Result<Vec<_>>>()?;
    if kind != MultisigKind::Singlesig && (threshold == 0 || threshold > keys.len()) {
        return Err(err(format!("threshold {threshold} out of range for {} keys", keys.len())));
    }
    Ok(OutputDescriptor {
        title: String::new(),
        script,
        kind,
        threshold,
        keys,
    })
}

/// Strip `name(` and `)` from `s`, returning `name`.
fn unwrap_func<'a>(s: &mut &'a str) -> Result<&'a str> {
    let (name, rest) = s.split_once('(').ok_or_else(|| err("missing '('"))?;
    let args = rest.strip_suffix(')').ok_or_else(|| err("missing ')'"))?;
    *s = args;
    Ok(name)
}

fn parse_key(k: &str) -> Result<KeyDescriptor> {
    let mut master_fingerprint = 0;
    let mut derivation_path = Path::default();
    let mut rest = k;
    if let Some(origin) = k.strip_prefix('[') {
        let (origin, after) = origin
            .split_once(']')
            .ok_or_else(|| err(format!("missing ']' in {k:?}")))?;
        rest = after;
        let (fp, path) = origin
            .split_once('/')
            .filter(|(fp, _)| fp.len() == 8)
            .ok_or_else(|| err(format!("missing or invalid fingerprint in {k:?}")))?;
        let fp = hex::decode(fp).map_err(|_| err(format!("invalid fingerprint in {k:?}")))?;
        master_fingerprint = u32::from_be_bytes([fp[0], fp[1], fp[2], fp[3]]);
        derivation_path = parse_origin_path(path)
            .map_err(|_| err(format!("invalid derivation path in {k:?}")))?;
    }
    let mut children = Vec::new();
    if let Some((xpub, path)) = rest.split_once('/') {
        children = parse_children(path).map_err(|_| err(format!("invalid children path in {k:?}")))?;
        rest = xpub;
    }
    key_from_xpub(rest, master_fingerprint, derivation_path, children)
}

fn key_from_xpub(
    xpub: &str,
    master_fingerprint: u32,
    derivation_path: Path,
    children: Vec<Derivation>,
) -> Result<KeyDescriptor> {
    let key: ExtendedKey = xpub
        .parse()
        .map_err(|_| err(format!("invalid extended key {xpub:?}")))?;
    if key.is_private() {
        return Err(err("private extended keys are not accepted"));
    }
    Ok(KeyDescriptor {
        network: key.network(),
        master_fingerprint,
        derivation_path,
        children,
        key_data: key.public_key_bytes(),
        chain_code: *key.chain_code(),
        parent_fingerprint: key.parent_fingerprint(),
    })
}

fn parse_origin_path(path: &str) -> Result<Path> {
    path.split('/')
        .map(bip32::parse_element)
        .collect::<Result<Vec<_>>>()
        .map(Path::new)
}

fn parse_children(path: &str) -> Result<Vec<Derivation>> {
    path.split('/')
        .map(|p| match p {
            "*" => Ok(Derivation::Wildcard { hardened: false }),
            "*'" | "*h" => Ok(Derivation::Wildcard { hardened: true }),
            _ if p.len() > 2 && p.starts_with('<') && p.ends_with('>') => {
                let (start, end) = p[1..p.len() - 1]
                    .split_once(';')
                    .ok_or_else(|| err(format!("invalid range path element {p:?}")))?;
                let start = bip32::parse_element(start)?;
                let end = bip32::parse_element(end)?;
                // Hardened ranges are not supported.
                if start > end || end >= HARDENED {
                    return Err(err(format!("invalid range path element {p:?}")));
                }
                Ok(Derivation::Range { start, end, hardened: false })
            }
            _ => {
                let e = bip32::parse_element(p)?;
                Ok(Derivation::Child {
                    index: e & !HARDENED,
                    hardened: e >= HARDENED,
                })
            }
        })
        .collect()
}

/// Parse a BlueWallet/Nunchuk multisig setup file.
fn parse_setup_file(txt: &str) -> Result<OutputDescriptor> {
    let mut desc = OutputDescriptor {
        title: String::new(),
        script: Script::P2wsh,
        kind: MultisigKind::SortedMulti,
        threshold: 0,
        keys: Vec::new(),
    };
    let mut nkeys = 0;
    let mut path = Path::default();
    let mut seen: Vec<(&str, &str)> = Vec::new();
    for line in txt.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, val) = line
            .split_once(": ")
            .ok_or_else(|| err(format!("invalid header {line:?}")))?;
        if let Some((_, old)) = seen.iter().find(|(k, _)| *k == key) {
            if *old != val {
                return Err(err(format!("inconsistent header value {key:?}")));
            }
            continue;
        }
        seen.push((key, val));
        match key {
            "Name" => desc.title = val.to_string(),
            "Policy" => {
                let (m, n) = val
                    .split_once(" of ")
                    .and_then(|(m, n)| Some((m.parse().ok()?, n.parse().ok()?)))
                    .ok_or_else(|| err(format!("invalid Policy header {val:?}")))?;
                desc.threshold = m;
                nkeys = n;
            }
            "Derivation" => {
                path = val
                    .strip_prefix("m/")
                    .and_then(|p| parse_origin_path(p).ok())
                    .ok_or_else(|| err(format!("invalid derivation {val:?}")))?;
            }
            "Format" => {
                desc.script = match val {
                    "P2WSH" => Script::P2wsh,
                    "P2SH" => Script::P2sh,
                    "P2WSH-P2SH" => Script::P2shP2wsh,
                    _ => return Err(err(format!("unknown format {val:?}"))),
                };
            }
            fp => {
                let fp_bytes = hex::decode(fp)
                    .ok()
                    .filter(|b| b.len() == 4)
                    .ok_or_else(|| err(format!("invalid fingerprint {fp:?}")))?;
                let mfp = u32::from_be_bytes([fp_bytes[0], fp_bytes[1], fp_bytes[2], fp_bytes[3]]);
                desc.keys.push(key_from_xpub(val, mfp, path.clone(), Vec::new())?);
            }
        }
    }
    if nkeys != desc.keys.len() {
        return Err(err(format!("expected {nkeys} keys, but got {}", desc.keys.len())));
    }
    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_5A08: &str = "xpub6F148LnjUhGrHfEN6Pa8VkwF8L6FJqYALxAkuHfacfVhMLVY4MRuUVMxr9pguAv67DHx1YFxqoKN8s4QfZtD9sR2xRCffTqi9E8FiFLAYk8";
    const KEY_DD4F: &str = "xpub6DnediUuY8Pcc6Fej8Yt2ZntPCyFdpbHBkNV7EawesRMbc6i9MKKMhKEv4JMMzwDJckaV4czBvNdc6ikwLiZqdUqMd5ZKQGYaQT4cXMeVjf";
    const KEY_9BAC: &str = "xpub6EefrCrMAduhNwnsHb3dAs8DYZSw4f63WyR6DaEByUHjwvPDdhczj15FyBBG4tbEJtf4vRKTv1ng5SPPnWv1Pve1f15EJfiBY5oYDN6VLEC";

    #[test]
    fn sorted_multi() {
        let text = format!(
            "wsh(sortedmulti(2,[5A0804E3/48'/0'/0'/2']{KEY_5A08},[DD4FADEE/48'/0'/0'/2']{KEY_DD4F},[9BACD5C0/48'/0'/0'/2']{KEY_9BAC}))"
        );
        let desc = parse(&text).unwrap();
        assert_eq!(desc.script, Script::P2wsh);
        assert_eq!(desc.kind, MultisigKind::SortedMulti);
        assert_eq!(desc.threshold, 2);
        assert_eq!(desc.keys.len(), 3);
        let k = &desc.keys[0];
        assert_eq!(k.master_fingerprint, 0x5a0804e3);
        assert_eq!(k.derivation_path.to_string(), "m/48h/0h/0h/2h");
        assert_eq!(
            hex::encode(k.key_data),
            "03a9394a2f1a4f99613a716956c8540f6dba6f18931c2639107221b267d740af23"
        );
        assert_eq!(k.parent_fingerprint, 0xc7bce7a8);
        assert_eq!(k.to_string(), KEY_5A08);
    }

    #[test]
    fn children_and_checksum() {
        let text = format!("wsh(multi(1,[dd4fadee/48h/0h/0h/2h]{KEY_DD4F}/<0;1>/*,{KEY_9BAC}/0/*))#hfwurrvt");
        let desc = parse(&text).unwrap();
        assert_eq!(desc.kind, MultisigKind::Multi);
        assert_eq!(
            desc.keys[0].children,
            vec![
                Derivation::Range { start: 0, end: 1, hardened: false },
                Derivation::Wildcard { hardened: false },
            ]
        );
        assert_eq!(
            desc.keys[1].children,
            vec![
                Derivation::Child { index: 0, hardened: false },
                Derivation::Wildcard { hardened: false },
            ]
        );
        assert!(desc.keys[1].derivation_path.is_empty());
    }

    #[test]
    fn singlesig_forms() {
        let desc = parse(&format!("sh(wpkh({KEY_DD4F}))")).unwrap();
        assert_eq!(desc.script, Script::P2shP2wpkh);
        assert_eq!(desc.kind, MultisigKind::Singlesig);
        assert_eq!(desc.threshold, 1);

        let desc = parse(&format!("wpkh([4bbaa801/84'/0'/0']{KEY_DD4F})")).unwrap();
        assert_eq!(desc.script, Script::P2wpkh);
        assert_eq!(desc.keys[0].master_fingerprint, 0x4bbaa801);

        let json = format!(r#"{{"label": "x", "descriptor": "tr({KEY_9BAC})"}}"#);
        assert_eq!(parse(&json).unwrap().script, Script::P2tr);
    }

    #[test]
    fn setup_file() {
        let txt = format!(
            "# BlueWallet Multisig setup file\n# this file contains only public keys\n#\nName: sh\nPolicy: 2 of 3\nDerivation: m/48'/0'/0'/2'\nFormat: P2WSH\n\n5A0804E3: {KEY_5A08}\n\nDD4FADEE: {KEY_DD4F}\n\n9BACD5C0: {KEY_9BAC}\n"
        );
        let desc = parse(&txt).unwrap();
        assert_eq!(desc.title, "sh");
        assert_eq!(desc.threshold, 2);
        assert_eq!(desc.kind, MultisigKind::SortedMulti);
        assert_eq!(desc.keys[1].master_fingerprint, 0xdd4fadee);
        assert_eq!(desc.keys[2].derivation_path.to_string(), "m/48h/0h/0h/2h");
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse("wsh(").is_err());
        assert!(parse(&format!("foo({KEY_DD4F})")).is_err());
        assert!(parse(&format!("wpkh(wpkh({KEY_DD4F}))")).is_err());
        assert!(parse(&format!("wsh(sortedmulti(x,{KEY_DD4F}))")).is_err());
        assert!(parse(&format!("wsh(sortedmulti(3,{KEY_DD4F},{KEY_9BAC}))")).is_err());
        assert!(parse("wpkh([zz/84h]xpub)").is_err());
    }
}
