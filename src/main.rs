use bank_domain::{BankError, Money};
use bank_workflow::{Bank, BankImpl, DurableBank};
use log::info;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use uuid::Uuid;

/// Transferencia lanzada en esta sesión, para poder re-ejecutarla.
struct Launched {
    workflow_id: String,
    from: i64,
    to: i64,
    amount: Money,
}

/// Pequeño menú interactivo sobre el banco durable.
///
/// Opciones soportadas:
/// 1) Ver cuentas
/// 2) Transferir
/// 3) Re-ejecutar una transferencia por id de workflow
/// 4) Ver bitácora de transferencias
/// 5) Salir
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Inicializar store (aplica migraciones embebidas y crea el ledger)
    let store = Arc::new(step_persistence::new_from_env()?);
    let seeded = store.seed_demo_accounts()?;
    info!("base lista ({} cuentas nuevas), namespace '{}'", seeded, store.config().namespace);
    let bank = DurableBank::register(BankImpl::with_provider(step_persistence::provider_for(store)));
    let mut launched: Vec<Launched> = Vec::new();

    loop {
        println!("\n== Bank CLI menu ==");
        println!("1) Ver cuentas");
        println!("2) Transferir");
        println!("3) Re-ejecutar transferencia (id de workflow)");
        println!("4) Ver bitácora de transferencias");
        println!("5) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        if io::stdin().read_line(&mut choice)? == 0 {
            break;
        }
        match choice.trim() {
            "1" => match bank.get_all_accounts() {
                Ok(accounts) => {
                    println!("\nID  | NOMBRE     | SALDO");
                    println!("---------------------------------");
                    for a in accounts {
                        println!("{:<3} | {:<10} | {:>12}", a.id, a.name, a.balance);
                    }
                }
                Err(e) => eprintln!("Error listando cuentas: {}", e),
            },
            "2" => {
                let (from, to, amount) = match prompt_transfer()? {
                    Some(t) => t,
                    None => continue,
                };
                let workflow_id = Uuid::new_v4().to_string();
                println!("Workflow: {}", workflow_id);
                report(bank.transfer_as(&workflow_id, from, to, amount));
                launched.push(Launched { workflow_id, from, to, amount });
            }
            "3" => {
                let id = prompt("Id de workflow: ")?;
                let id = id.trim();
                let (from, to, amount) = match launched.iter().find(|l| l.workflow_id == id) {
                    Some(l) => (l.from, l.to, l.amount),
                    None => {
                        println!("Workflow no lanzado en esta sesión; indica sus datos");
                        match prompt_transfer()? {
                            Some(t) => t,
                            None => continue,
                        }
                    }
                };
                report(bank.transfer_as(id, from, to, amount));
            }
            "4" => match bank.transfer_log() {
                Ok(log) => {
                    println!("\nID  | DE  | A   | MONTO        | ESTADO  | FECHA                | ERROR");
                    println!("------------------------------------------------------------------------------");
                    for e in log {
                        println!("{:<3} | {:<3} | {:<3} | {:>12} | {:<7} | {} | {}",
                                 e.id,
                                 e.from_account,
                                 e.to_account,
                                 e.amount,
                                 e.status,
                                 e.created_at.format("%Y-%m-%d %H:%M:%S"),
                                 e.error_message.as_deref().unwrap_or("-"));
                    }
                }
                Err(e) => eprintln!("Error leyendo bitácora: {}", e),
            },
            "5" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

fn report(result: Result<(), BankError>) {
    match result {
        Ok(()) => println!("Transferencia completada"),
        Err(e) if e.is_business() => println!("Transferencia rechazada: {}", e),
        Err(e) => eprintln!("Error de infraestructura (se puede re-ejecutar): {}", e),
    }
}

fn prompt_transfer() -> io::Result<Option<(i64, i64, Money)>> {
    let from = match prompt("Cuenta origen (id): ")?.trim().parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("Id inválido");
            return Ok(None);
        }
    };
    let to = match prompt("Cuenta destino (id): ")?.trim().parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("Id inválido");
            return Ok(None);
        }
    };
    let amount = match prompt("Monto (ej: 100.00): ")?.parse::<Money>() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(None);
        }
    };
    Ok(Some((from, to, amount)))
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
