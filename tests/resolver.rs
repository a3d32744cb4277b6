//! End-to-end behaviour of `ProxyResolver` with in-memory collaborators.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pacproxy::pac::{ScriptFetcher, StaticNetwork};
use pacproxy::{EvalBudget, PacError, ProxyDescriptor, ProxyKind, ProxyResolver, RoutingQuery};

const CORP_PAC: &str = r#"
function FindProxyForURL(url, host) {
    if (isPlainHostName(host) || dnsDomainIs(host, ".corp.example"))
        return "DIRECT";
    if (isInNet(host, "10.0.0.0", "255.0.0.0"))
        return "DIRECT";
    if (shExpMatch(url, "https://*.bank.example/*"))
        return "SOCKS socks.corp.example:1080";
    return "PROXY cache1.corp.example:3128; PROXY cache2.corp.example; DIRECT";
}
"#;

#[derive(Default)]
struct MapFetcher {
    bodies: Mutex<HashMap<String, String>>,
}

impl MapFetcher {
    fn serve(&self, url: &str, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }
}

impl ScriptFetcher for MapFetcher {
    fn fetch(&self, location: &str, _timeout: Duration) -> pacproxy::Result<String> {
        self.bodies
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| PacError::Fetch {
                url: location.to_string(),
                reason: "404".into(),
            })
    }
}

fn network() -> Arc<StaticNetwork> {
    let ip = |s: &str| s.parse::<IpAddr>().unwrap();
    Arc::new(
        StaticNetwork::new()
            .with_host("build.example", &[ip("10.4.4.4")])
            .with_host("www.example.com", &[ip("93.184.216.34")]),
    )
}

fn resolver_with(fetcher: Arc<MapFetcher>) -> ProxyResolver {
    ProxyResolver::with_collaborators(network(), fetcher)
}

fn resolver() -> ProxyResolver {
    resolver_with(Arc::new(MapFetcher::default()))
}

fn rendered(proxies: &[ProxyDescriptor]) -> Vec<String> {
    proxies.iter().map(|p| p.to_string()).collect()
}

#[test]
fn corporate_policy_routes_by_host() {
    let r = resolver();
    r.set_credentials("u", "p");
    r.configure_from_script(CORP_PAC).unwrap();

    assert_eq!(rendered(&r.resolve_url("http://intranet/")), ["DIRECT"]);
    assert_eq!(rendered(&r.resolve_url("http://wiki.corp.example/")), ["DIRECT"]);
    assert_eq!(rendered(&r.resolve_url("http://build.example/")), ["DIRECT"]);
    assert_eq!(
        rendered(&r.resolve_url("https://online.bank.example/login")),
        ["SOCKS socks.corp.example:1080"]
    );

    let web = r.resolve_url("http://www.example.com/");
    assert_eq!(
        rendered(&web),
        [
            "PROXY cache1.corp.example:3128",
            "PROXY cache2.corp.example:8080",
            "DIRECT"
        ]
    );
    assert_eq!(web[0].kind, ProxyKind::Http);
    assert_eq!((web[0].user.as_str(), web[0].password.as_str()), ("u", "p"));
    assert_eq!(web[2].user, "");
}

#[test]
fn unresolvable_hosts_do_not_break_isinnet() {
    let r = resolver();
    r.configure_from_script(CORP_PAC).unwrap();
    let proxies = r.resolve(&RoutingQuery::new("http://ghost.example/", "ghost.example"));
    assert_eq!(proxies.len(), 3);
}

#[test]
fn throwing_script_yields_direct() {
    let r = resolver();
    r.configure_from_script("function FindProxyForURL(u, h) { return undefinedThing.x; }")
        .unwrap();
    assert_eq!(r.resolve_url("http://a.example/"), vec![ProxyDescriptor::direct()]);
}

#[test]
fn runaway_script_yields_direct() {
    let r = resolver().with_budget(EvalBudget {
        timeout: Duration::from_secs(5),
        loop_iteration_limit: 5_000,
        recursion_limit: 64,
    });
    r.configure_from_script("function FindProxyForURL(u, h) { for (;;) {} }")
        .unwrap();
    assert_eq!(r.resolve_url("http://a.example/"), vec![ProxyDescriptor::direct()]);
}

#[test]
fn only_unknown_directives_yield_direct() {
    let r = resolver();
    r.configure_from_script("function FindProxyForURL(u, h) { return 'HTTPS x:443; QUIC y'; }")
        .unwrap();
    assert_eq!(r.resolve_url("http://a.example/"), vec![ProxyDescriptor::direct()]);
}

#[test]
fn bad_script_keeps_previous_policy() {
    let r = resolver();
    let first = r
        .configure_from_script("function FindProxyForURL(u, h) { return 'PROXY keep:1'; }")
        .unwrap();

    let err = r
        .configure_from_script("function FindProxyForURL(u, h) { return 'PROXY new:1' ")
        .unwrap_err();
    assert!(matches!(err, PacError::ScriptCompile(_)));
    assert!(matches!(r.configure_from_script(""), Err(PacError::EmptyScript)));

    assert_eq!(r.generation(), Some(first));
    assert_eq!(rendered(&r.resolve_url("http://a.example/")), ["PROXY keep:1"]);
}

#[test]
fn fetch_failures_keep_previous_policy() {
    let fetcher = Arc::new(MapFetcher::default());
    fetcher.serve(
        "http://wpad/wpad.dat",
        "function FindProxyForURL(u, h) { return 'PROXY wpad:80'; }",
    );
    fetcher.serve("http://wpad/empty.pac", "  \n ");
    let r = resolver_with(Arc::clone(&fetcher));

    assert!(matches!(
        r.configure_from_url("http://wpad/missing.pac"),
        Err(PacError::Fetch { .. })
    ));
    assert!(!r.is_configured());

    r.configure_from_url("http://wpad/wpad.dat").unwrap();
    assert!(matches!(
        r.configure_from_url("http://wpad/empty.pac"),
        Err(PacError::Fetch { .. })
    ));
    assert_eq!(rendered(&r.resolve_url("http://a.example/")), ["PROXY wpad:80"]);
}

#[test]
fn reconfiguration_replaces_the_script() {
    let r = resolver();
    let a = r
        .configure_from_script("function FindProxyForURL(u, h) { return 'PROXY a:1'; }")
        .unwrap();
    let b = r
        .configure_from_script("function FindProxyForURL(u, h) { return 'SOCKS b:2'; }")
        .unwrap();
    assert!(b > a);
    assert_eq!(r.generation(), Some(b));
    assert_eq!(rendered(&r.resolve_url("http://x.example/")), ["SOCKS b:2"]);
}

#[test]
fn concurrent_resolves_see_whole_generations() {
    const SCRIPT_A: &str = r#"
        var label = "a";
        function FindProxyForURL(u, h) { return "PROXY " + label + "1:1; PROXY " + label + "2:2"; }
    "#;
    const SCRIPT_B: &str = r#"
        var label = "b";
        function FindProxyForURL(u, h) { return "PROXY " + label + "1:1; PROXY " + label + "2:2"; }
    "#;

    let r = Arc::new(resolver());
    r.configure_from_script(SCRIPT_A).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let r = Arc::clone(&r);
            thread::spawn(move || {
                for _ in 0..10 {
                    let got = rendered(&r.resolve_url("http://x.example/"));
                    assert!(
                        got == ["PROXY a1:1", "PROXY a2:2"] || got == ["PROXY b1:1", "PROXY b2:2"],
                        "mixed result: {got:?}"
                    );
                }
            })
        })
        .collect();

    let writer = {
        let r = Arc::clone(&r);
        thread::spawn(move || {
            for i in 0..10 {
                let body = if i % 2 == 0 { SCRIPT_B } else { SCRIPT_A };
                r.configure_from_script(body).unwrap();
            }
        })
    };

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(r.is_configured());
}
