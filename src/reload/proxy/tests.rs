use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::reload::trigger::tests::wait_until;
use crate::script::value::NativeFn;
use crate::script::{Module, get_attr};

struct Script {
    _dir: TempDir,
    module: Arc<Module>,
}

impl Script {
    fn load(source: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.rl");
        fs::write(&path, source).unwrap();
        let module = Module::load(&path).unwrap();
        Self { _dir: dir, module }
    }

    fn edit(&self, source: &str) {
        fs::write(self.module.path(), source).unwrap();
    }

    fn proxy(&self, name: &str) -> Proxy {
        self.module.get(name).unwrap().as_proxy().unwrap().clone()
    }
}

const ADD_ONE: &str = "@reloadr\nfn add_one(n) { return n + 1; }\n";

const POINT: &str = "\
@reloadr
class Point {
    x = 0;
    y = 0;
    fn init(self, x) { self.x = x; }
    fn move(self, dx) { self.x = self.x + dx; }
}
";

#[test]
fn test_function_reload_uses_new_body() {
    let script = Script::load(ADD_ONE);
    let add_one = script.proxy("add_one");
    assert_eq!(add_one.call(&[Value::Int(1)]).unwrap(), Value::Int(2));

    script.edit("@reloadr\nfn add_one(n) { return n + 2; }\n");
    assert!(add_one.reload().unwrap().is_swapped());

    assert_eq!(add_one.call(&[Value::Int(1)]).unwrap(), Value::Int(3));
}

#[test]
fn test_class_reload_keeps_instance_state() {
    let script = Script::load(POINT);
    let point = script.proxy("Point");

    let p = point.call(&[Value::Int(0)]).unwrap();
    let instance = Arc::clone(p.as_instance().unwrap());
    let id = instance.id();
    crate::script::call_value(&get_attr(&p, "move").unwrap(), &[Value::Int(1)]).unwrap();
    assert_eq!(instance.get("x"), Some(Value::Int(1)));

    script.edit(&POINT.replace("self.x + dx", "self.x + dx * 10"));
    let outcome = point.reload().unwrap();
    assert!(matches!(outcome, ReloadOutcome::Swapped { retagged: 1 }));

    crate::script::call_value(&get_attr(&p, "move").unwrap(), &[Value::Int(1)]).unwrap();
    assert_eq!(instance.get("x"), Some(Value::Int(11)));
    assert_eq!(instance.id(), id);
    assert!(Arc::ptr_eq(&instance.class(), &point.as_class().unwrap().current()));
}

#[test]
fn test_construct_uses_current_class() {
    let script = Script::load(POINT);
    let point = script.proxy("Point");

    script.edit(&POINT.replace("x = 0;", "x = 0;\n    z = 7;"));
    point.reload().unwrap();

    let p = point.call(&[Value::Int(2)]).unwrap();
    let instance = p.as_instance().unwrap();
    assert_eq!(instance.get("z"), Some(Value::Int(7)));
    assert_eq!(point.as_class().unwrap().live_instances(), 1);
}

#[test]
fn test_malformed_source_keeps_implementation() {
    let script = Script::load(ADD_ONE);
    let add_one = script.proxy("add_one");
    let before = add_one.as_function().unwrap().current();

    script.edit("@reloadr\nfn add_one(n) { return n + ; }\n");
    let outcome = add_one.reload().unwrap();

    assert!(matches!(outcome, ReloadOutcome::Rejected(ReloadError::Syntax(_))));
    assert!(Arc::ptr_eq(&before, &add_one.as_function().unwrap().current()));
    assert_eq!(add_one.call(&[Value::Int(1)]).unwrap(), Value::Int(2));
}

#[test]
fn test_renamed_definition_is_rejected() {
    let script = Script::load(POINT);
    let point = script.proxy("Point");
    let before = point.as_class().unwrap().current();

    script.edit(&POINT.replace("class Point", "class Vector"));
    let outcome = point.reload().unwrap();

    assert!(matches!(outcome, ReloadOutcome::Rejected(ReloadError::NotFound { .. })));
    assert!(Arc::ptr_eq(&before, &point.as_class().unwrap().current()));
}

#[test]
fn test_runtime_error_propagates() {
    let script = Script::load(POINT);
    let point = script.proxy("Point");
    let before = point.as_class().unwrap().current();

    script.edit(&POINT.replace("y = 0;", "y = 1 / 0;"));
    assert!(matches!(point.reload().unwrap_err(), ReloadError::Runtime(_)));
    assert!(Arc::ptr_eq(&before, &point.as_class().unwrap().current()));
}

#[test]
fn test_reload_is_idempotent() {
    let script = Script::load(ADD_ONE);
    let add_one = script.proxy("add_one");

    add_one.reload().unwrap();
    let first = add_one.call(&[Value::Int(40)]).unwrap();
    add_one.reload().unwrap();
    let second = add_one.call(&[Value::Int(40)]).unwrap();

    assert_eq!(first, Value::Int(41));
    assert_eq!(first, second);
}

#[test]
fn test_dropped_instance_is_skipped() {
    let script = Script::load(POINT);
    let point = script.proxy("Point");

    let kept = point.call(&[Value::Int(1)]).unwrap();
    let dropped = point.call(&[Value::Int(2)]).unwrap();
    drop(dropped);

    let outcome = point.reload().unwrap();
    assert!(matches!(outcome, ReloadOutcome::Swapped { retagged: 1 }));
    assert_eq!(kept.as_instance().unwrap().get("x"), Some(Value::Int(1)));
}

#[test]
fn test_function_reload_uses_original_path() {
    let script = Script::load(ADD_ONE);
    let add_one = script.proxy("add_one");
    let path = add_one.source_path().to_path_buf();

    add_one.reload().unwrap();
    add_one.reload().unwrap();

    assert_eq!(add_one.source_path(), path);
    assert_eq!(add_one.as_function().unwrap().current().name, "add_one");
}

#[test]
fn test_module_binding_stays_the_proxy() {
    let script = Script::load(ADD_ONE);
    let add_one = script.proxy("add_one");

    add_one.reload().unwrap();

    assert!(script.proxy("add_one").same(&add_one));
}

#[test]
fn test_script_members() {
    let script = Script::load(&format!(
        "{ADD_ONE}\nfn reload_now() {{ return add_one._reload(); }}\n"
    ));
    script.edit("@reloadr\nfn add_one(n) { return n + 5; }\nfn reload_now() { return add_one._reload(); }\n");

    assert_eq!(script.module.call("reload_now", &[]).unwrap(), Value::Bool(true));
    assert_eq!(script.module.call("add_one", &[Value::Int(1)]).unwrap(), Value::Int(6));
}

#[test]
fn test_class_attributes_forward_to_current() {
    let script = Script::load(POINT);
    let point = Value::Proxy(script.proxy("Point"));

    assert_eq!(get_attr(&point, "y").unwrap(), Value::Int(0));
    assert!(matches!(get_attr(&point, "move").unwrap(), Value::Function(_)));
    assert!(get_attr(&point, "missing").is_err());
}

#[test]
fn test_function_proxy_has_no_plain_attributes() {
    let script = Script::load(ADD_ONE);
    let add_one = Value::Proxy(script.proxy("add_one"));

    assert!(matches!(get_attr(&add_one, "_reload").unwrap(), Value::Native(_)));
    assert!(get_attr(&add_one, "x").is_err());
}

#[test]
fn test_wrap_rejects_plain_values() {
    assert!(matches!(
        Proxy::wrap(Value::Int(3)).unwrap_err(),
        ReloadError::Unsupported("int")
    ));
}

#[test]
fn test_wrap_existing_proxy_is_identity() {
    let script = Script::load(ADD_ONE);
    let add_one = script.proxy("add_one");
    let again = Proxy::wrap(Value::Proxy(add_one.clone())).unwrap();
    assert!(again.same(&add_one));
}

#[test]
fn test_script_timer_trigger_stops() {
    let script = Script::load(&format!(
        "{ADD_ONE}\nfn start() {{ add_one._start_timer_reload(0.01); }}\nfn stop() {{ return add_one._stop_reload(); }}\n"
    ));
    let add_one = script.proxy("add_one");

    script.module.call("start", &[]).unwrap();
    assert_eq!(add_one.trigger_count(), 1);

    script.edit(&format!(
        "@reloadr\nfn add_one(n) {{ return n + 100; }}\nfn start() {{}}\nfn stop() {{ return add_one._stop_reload(); }}\n"
    ));
    assert!(wait_until(Duration::from_secs(5), || {
        add_one.call(&[Value::Int(1)]).unwrap() == Value::Int(101)
    }));

    assert_eq!(script.module.call("stop", &[]).unwrap(), Value::Int(1));
    assert_eq!(add_one.trigger_count(), 0);
}

#[test]
fn test_timer_rejects_bad_interval() {
    let script = Script::load(&format!(
        "{ADD_ONE}\nfn start() {{ add_one._start_timer_reload(0); }}\n"
    ));
    assert!(matches!(
        script.module.call("start", &[]).unwrap_err(),
        RuntimeError::Type(_)
    ));
}

#[test]
fn test_watch_trigger_reloads_on_save() {
    let script = Script::load(ADD_ONE);
    let add_one = script.proxy("add_one");
    let handle = add_one.start_watch_reload().unwrap();

    script.edit("@reloadr\nfn add_one(n) { return n + 2; }\n");
    assert!(wait_until(Duration::from_secs(5), || {
        add_one.call(&[Value::Int(1)]).unwrap() == Value::Int(3)
    }));

    handle.stop();
}

#[test]
fn test_concurrent_reloads_and_constructs() {
    let script = Script::load(POINT);
    let point = script.proxy("Point");
    let class = Arc::clone(point.as_class().unwrap());

    let reloader = {
        let point = point.clone();
        std::thread::spawn(move || {
            for _ in 0..20 {
                point.reload().unwrap();
            }
        })
    };
    let instances: Vec<_> = (0..50)
        .map(|i| class.construct(&[Value::Int(i)]).unwrap())
        .collect();
    reloader.join().unwrap();

    let current = class.current();
    for instance in &instances {
        assert!(Arc::ptr_eq(&instance.class(), &current));
    }
    assert_eq!(class.live_instances(), 50);
}

#[test]
fn test_deeply_nested_edit_is_rejected() {
    let script = Script::load(ADD_ONE);
    let add_one = script.proxy("add_one");

    let arms = "else if n == 0 { return 0; } ".repeat(20_000);
    script.edit(&format!(
        "@reloadr\nfn add_one(n) {{ if n < 0 {{ return 0; }} {arms}return n + 2; }}\n"
    ));
    let outcome = add_one.reload().unwrap();
    assert!(matches!(outcome, ReloadOutcome::Rejected(ReloadError::Syntax(_))));

    script.edit(&format!("@reloadr\nfn add_one(n) {{{}", "if true {".repeat(100_000)));
    let outcome = add_one.reload().unwrap();
    assert!(matches!(outcome, ReloadOutcome::Rejected(ReloadError::Syntax(_))));

    assert_eq!(add_one.call(&[Value::Int(1)]).unwrap(), Value::Int(2));
}

#[test]
fn test_in_flight_call_finishes_on_old_body() {
    let script = Script::load("@reloadr\nfn slow(n) { gate(); return n + 1; }\n");
    let slow = script.proxy("slow");

    let (entered_tx, entered) = crossbeam::channel::bounded::<()>(1);
    let (release, released) = crossbeam::channel::bounded::<()>(1);
    let gate = NativeFn::new("gate", Some(0), move |_| {
        entered_tx.send(()).ok();
        released.recv().ok();
        Ok(Value::Nil)
    });
    script.module.set("gate", Value::Native(gate));

    let caller = {
        let slow = slow.clone();
        std::thread::spawn(move || slow.call(&[Value::Int(1)]).unwrap())
    };
    entered.recv().unwrap();

    script.edit("@reloadr\nfn slow(n) { return n + 2; }\n");
    assert!(slow.reload().unwrap().is_swapped());
    release.send(()).unwrap();

    assert_eq!(caller.join().unwrap(), Value::Int(2));
    assert_eq!(slow.call(&[Value::Int(1)]).unwrap(), Value::Int(3));
}

#[test]
fn test_timer_reload_allows_deep_recursion() {
    const DOWN: &str = "fn down(n) { if n == 0 { return 0; } return down(n - 1) + 1; }\n";
    let script = Script::load(&format!("{DOWN}@reloadr\nclass Deep {{ depth = 0; }}\n"));
    let deep = script.proxy("Deep");
    let handle = deep.start_timer_reload(Duration::from_millis(10)).unwrap();

    script.edit(&format!("{DOWN}@reloadr\nclass Deep {{ depth = down(190); }}\n"));
    assert!(wait_until(Duration::from_secs(5), || {
        deep.get_attr("depth") == Some(Value::Int(190))
    }));
    assert!(!handle.is_finished());

    handle.stop();
}
